pub(crate) mod alternating;
pub(crate) mod column_generation;
pub(crate) mod iterative;
pub(crate) mod midpoint;
pub(crate) mod pool;
pub(crate) mod sampling;

use crate::{
    engine::GenerationReport,
    error::GeneratorError,
    oracle::{Oracle, OracleSolution},
    uncertainty::UncertaintySet,
};
use hiro_solver::SolverParams;
use ndarray::{Array2, ArrayView2};
use std::time::Instant;
use tracing::debug;

/// Everything a search strategy needs besides its own state.
pub(crate) struct SearchContext<'a, O: Oracle + ?Sized> {
    pub oracle: &'a O,
    pub uncertainty: &'a UncertaintySet,
    pub num_scenarios: usize,
    pub deadline: Option<Instant>,
    pub max_iterations: usize,
    pub gap: f64,
}

impl<'a, O: Oracle + ?Sized> SearchContext<'a, O> {
    pub fn num_elements(&self) -> usize {
        self.uncertainty.num_elements()
    }

    pub fn has_time(&self) -> bool {
        self.deadline.map_or(true, |deadline| Instant::now() < deadline)
    }

    /// Backend parameters limited to the time left before the deadline.
    pub fn solver_params(&self) -> SolverParams {
        let params = SolverParams::default();
        match self.deadline {
            Some(deadline) => params.with_time_limit(deadline.saturating_duration_since(Instant::now())),
            None => params,
        }
    }

    /// Every scenario set to the same row.
    pub fn broadcast(&self, row: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((self.num_scenarios, row.len()), |(_, i)| row[i])
    }

    pub fn call_oracle(
        &self,
        costs: ArrayView2<'_, f64>,
        report: &mut GenerationReport,
    ) -> Result<OracleSolution, GeneratorError> {
        let result = self.oracle.solve_ip(costs)?;
        report.oracle_calls += 1;
        report.oracle_nodes += result.nodes;
        debug!(
            "oracle call {}: value {:.6}, {} nodes",
            report.oracle_calls, result.upper_bound, result.nodes
        );
        Ok(result)
    }
}

/// Best instance seen so far by an oracle-driven search.
pub(crate) struct Incumbent {
    pub value: f64,
    pub costs: Array2<f64>,
}

impl Incumbent {
    pub fn new(value: f64, costs: Array2<f64>) -> Self {
        Self { value, costs }
    }

    pub fn offer(&mut self, value: f64, costs: &Array2<f64>) -> bool {
        if value > self.value {
            self.value = value;
            self.costs = costs.clone();
            true
        } else {
            false
        }
    }
}
