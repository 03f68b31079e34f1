//! Generation of hard scenario cost matrices for min-max robust combinatorial
//! problems. The problem structure is supplied through an [`Oracle`].

pub mod config;
pub mod engine;
pub mod error;
pub mod oracle;
mod strategies;
pub mod uncertainty;

pub use config::{Algorithm, GeneratorSettings};
pub use engine::{GenerationReport, HardInstance, HardInstanceGenerator};
pub use error::GeneratorError;
pub use oracle::{robust_value, EnumeratedOracle, Oracle, OracleSolution, Relaxation, RelaxationRow};
pub use uncertainty::UncertaintySet;
