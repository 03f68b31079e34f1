use crate::{
    error::SolverError,
    model::{Constraint, Var},
};

/// Hook invoked synchronously by the search whenever it reaches an integral
/// candidate. Returning an empty set accepts the candidate; otherwise the cuts
/// are added to the model and the node is re-solved.
pub trait LazyCallback {
    fn on_candidate(&mut self, candidate: &Candidate<'_>) -> Result<Vec<Constraint>, SolverError>;
}

impl<F> LazyCallback for F
where
    F: FnMut(&Candidate<'_>) -> Result<Vec<Constraint>, SolverError>,
{
    fn on_candidate(&mut self, candidate: &Candidate<'_>) -> Result<Vec<Constraint>, SolverError> {
        self(candidate)
    }
}

/// Read-only view of the integral point under inspection.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    values: &'a [f64],
    objective: f64,
}

impl<'a> Candidate<'a> {
    pub fn new(values: &'a [f64], objective: f64) -> Self {
        Self { values, objective }
    }

    /// `None` when the variable is not part of the current relaxation or the
    /// engine reported a non-finite value for it.
    pub fn value(&self, var: Var) -> Option<f64> {
        self.values.get(var.index()).copied().filter(|v| v.is_finite())
    }

    pub fn require(&self, var: Var) -> Result<f64, SolverError> {
        self.value(var).ok_or(SolverError::ValueUnavailable(var))
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }
}
