use crate::model::Var;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("model is infeasible")]
    Infeasible,
    #[error("model is unbounded")]
    Unbounded,
    #[error("search stopped after {nodes} nodes without a feasible solution")]
    NoIncumbent { nodes: u64 },
    #[error("value of {0} is unavailable")]
    ValueUnavailable(Var),
    #[error("{0} does not belong to this model")]
    UnknownVariable(Var),
    #[error("a lazy callback is already registered")]
    CallbackAlreadyRegistered,
    #[error("lazy callback failed: {0}")]
    Callback(String),
    #[error("LP engine error: {0}")]
    Lp(String),
}
