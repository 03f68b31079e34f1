use crate::config::Algorithm;
use hiro_solver::SolverError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("the oracle found no feasible solution")]
    OracleInfeasible,
    #[error("oracle returned an invalid solution: {0}")]
    InvalidSolution(String),
    #[error("algorithm '{0}' is not supported")]
    Unsupported(Algorithm),
    #[error("column generation bound decreased from {previous} to {current}")]
    BoundRegression { previous: f64, current: f64 },
    #[error("scenario {scenario} element {element} has cost {value} outside [{lower}, {upper}]")]
    BoundsViolated {
        scenario: usize,
        element: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error(transparent)]
    Solver(#[from] SolverError),
}
