//! A small modelling layer over the `microlp` simplex with a single-threaded
//! LP-based branch-and-bound and a lazy constraint hook.
//!
//! A [`Model`] owns every variable, constraint and lazy cut it is given; dropping
//! it releases all of them, so each caller gets an isolated solving environment.

mod branch;
mod callback;
mod error;
mod model;

pub use branch::{SolveOutcome, SolveStatus, SolverParams};
pub use callback::{Candidate, LazyCallback};
pub use error::SolverError;
pub use model::{Constraint, LinExpr, Model, Sense, Var, VarKind};
