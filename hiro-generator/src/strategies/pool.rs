use crate::{error::GeneratorError, uncertainty::UncertaintySet};
use hiro_solver::{Constraint, LinExpr, Model, SolveOutcome, Var};
use ndarray::{Array2, ArrayView2};

const SAME_SOLUTION_TOLERANCE: f64 = 1e-6;
const TIE_TOLERANCE: f64 = 1e-9;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn same_vector(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= SAME_SOLUTION_TOLERANCE)
}

/// Oracle solutions known to a search. With a capacity the oldest entries are
/// evicted first.
#[derive(Debug, Clone)]
pub(crate) struct SolutionPool {
    solutions: Vec<Vec<f64>>,
    capacity: Option<usize>,
}

impl SolutionPool {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            solutions: Vec::new(),
            capacity,
        }
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        self.solutions.iter().any(|s| same_vector(s, x))
    }

    /// Returns `false` when the solution is already pooled.
    pub fn insert(&mut self, x: Vec<f64>) -> bool {
        if self.contains(&x) {
            return false;
        }
        if let Some(capacity) = self.capacity {
            while self.solutions.len() >= capacity.max(1) {
                self.solutions.remove(0);
            }
        }
        self.solutions.push(x);
        true
    }

    pub fn solutions(&self) -> &[Vec<f64>] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }
}

/// Links every solution to the scenario under which it is most expensive.
/// Ties go to the scenario with the fewest solutions so far, then the lowest
/// index.
pub(crate) fn assign_scenarios(costs: ArrayView2<'_, f64>, solutions: &[Vec<f64>]) -> Vec<usize> {
    let mut usage = vec![0usize; costs.nrows()];
    let mut assignment = Vec::with_capacity(solutions.len());
    for x in solutions {
        let values: Vec<f64> = costs
            .rows()
            .into_iter()
            .map(|row| row.iter().zip(x).map(|(c, v)| c * v).sum::<f64>())
            .collect();
        let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let scenario = (0..values.len())
            .filter(|&k| values[k] >= best - TIE_TOLERANCE)
            .min_by_key(|&k| (usage[k], k))
            .unwrap_or(0);
        if let Some(count) = usage.get_mut(scenario) {
            *count += 1;
        }
        assignment.push(scenario);
    }
    assignment
}

/// Cost variables `c[k][i]` within the box, with one budget row per scenario.
pub(crate) struct CostVariables {
    vars: Vec<Vec<Var>>,
}

impl CostVariables {
    pub fn add(model: &mut Model, uncertainty: &UncertaintySet, num_scenarios: usize) -> Self {
        let upper_sum: f64 = uncertainty.upper().iter().sum();
        let vars: Vec<Vec<Var>> = (0..num_scenarios)
            .map(|_| {
                uncertainty
                    .lower()
                    .iter()
                    .zip(uncertainty.upper())
                    .map(|(&l, &u)| model.add_continuous(l, u))
                    .collect()
            })
            .collect();
        if uncertainty.budget() < upper_sum {
            for row in &vars {
                let expr: LinExpr = row.iter().map(|&v| (v, 1.0)).collect();
                model.add_constraint(Constraint::le(expr, uncertainty.budget()));
            }
        }
        Self { vars }
    }

    pub fn get(&self, scenario: usize, element: usize) -> Var {
        self.vars[scenario][element]
    }

    /// `c^k · x` as an expression.
    pub fn scenario_expr(&self, scenario: usize, x: &[f64]) -> LinExpr {
        self.vars[scenario]
            .iter()
            .zip(x)
            .filter(|&(_, &a)| a != 0.0)
            .map(|(&var, &a)| (var, a))
            .collect()
    }

    pub fn read(&self, outcome: &SolveOutcome) -> Result<Array2<f64>, GeneratorError> {
        let rows = self.vars.len();
        let cols = self.vars.first().map_or(0, |row| row.len());
        let mut costs = Array2::zeros((rows, cols));
        for (k, row) in self.vars.iter().enumerate() {
            for (i, &var) in row.iter().enumerate() {
                costs[[k, i]] = outcome.require(var)?;
            }
        }
        Ok(costs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pool_rejects_duplicates() {
        let mut pool = SolutionPool::new(None);
        assert!(pool.insert(vec![1.0, 0.0]));
        assert!(!pool.insert(vec![1.0, 1e-9]));
        assert!(pool.insert(vec![0.0, 1.0]));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_capacity_keeps_latest() {
        let mut pool = SolutionPool::new(Some(1));
        pool.insert(vec![1.0, 0.0]);
        pool.insert(vec![0.0, 1.0]);
        assert_eq!(pool.solutions(), &[vec![0.0, 1.0]]);
        assert!(!pool.insert(vec![0.0, 1.0]));
    }

    #[test]
    fn test_assignment_spreads_ties() {
        let costs = array![[1.0, 1.0], [1.0, 1.0]];
        let solutions = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        assert_eq!(assign_scenarios(costs.view(), &solutions), vec![0, 1, 0]);
    }

    #[test]
    fn test_assignment_picks_worst_scenario() {
        let costs = array![[1.0, 5.0], [3.0, 1.0]];
        let solutions = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(assign_scenarios(costs.view(), &solutions), vec![1, 0]);
    }
}
