use crate::error::GeneratorError;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Answer of a worst-case selection oracle for one scenario cost matrix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OracleSolution {
    pub solution: Vec<f64>,
    /// Robust objective `max_k c^k·x` of `solution`.
    pub upper_bound: f64,
    pub nodes: u64,
}

/// One equality row `Σ a_i x_i = rhs` of an LP relaxation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelaxationRow {
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

/// LP relaxation `{ x : A x = b, 0 <= x <= u }` of the feasible set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Relaxation {
    pub rows: Vec<RelaxationRow>,
    pub element_upper: Vec<f64>,
}

/// Problem-specific worst-case selection oracle. Given `costs` with one
/// scenario per row, returns the solution minimising the worst scenario cost.
pub trait Oracle {
    fn solve_ip(&self, costs: ArrayView2<'_, f64>) -> Result<OracleSolution, GeneratorError>;

    fn relaxation(&self, _num_elements: usize) -> Option<Relaxation> {
        None
    }
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn solve_ip(&self, costs: ArrayView2<'_, f64>) -> Result<OracleSolution, GeneratorError> {
        (**self).solve_ip(costs)
    }

    fn relaxation(&self, num_elements: usize) -> Option<Relaxation> {
        (**self).relaxation(num_elements)
    }
}

pub fn robust_value(costs: ArrayView2<'_, f64>, x: &[f64]) -> f64 {
    costs
        .rows()
        .into_iter()
        .map(|row| row.iter().zip(x).map(|(c, v)| c * v).sum::<f64>())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Oracle over an explicit list of feasible solutions. Useful for problems
/// small enough to enumerate.
#[derive(Debug, Clone)]
pub struct EnumeratedOracle {
    solutions: Vec<Vec<f64>>,
}

impl EnumeratedOracle {
    pub fn new(solutions: Vec<Vec<f64>>) -> Self {
        Self { solutions }
    }

    /// All incidence vectors of length `n` selecting exactly `k` elements.
    pub fn choose(n: usize, k: usize) -> Self {
        let mut solutions = Vec::new();
        let mut current = Vec::with_capacity(k);
        fn recurse(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<f64>>) {
            if current.len() == k {
                let mut x = vec![0.0; n];
                for &i in current.iter() {
                    x[i] = 1.0;
                }
                out.push(x);
                return;
            }
            for i in start..n {
                current.push(i);
                recurse(i + 1, n, k, current, out);
                current.pop();
            }
        }
        recurse(0, n, k, &mut current, &mut solutions);
        Self { solutions }
    }

    pub fn solutions(&self) -> &[Vec<f64>] {
        &self.solutions
    }
}

impl Oracle for EnumeratedOracle {
    fn solve_ip(&self, costs: ArrayView2<'_, f64>) -> Result<OracleSolution, GeneratorError> {
        let mut best: Option<(f64, &Vec<f64>)> = None;
        for x in &self.solutions {
            if x.len() != costs.ncols() {
                return Err(GeneratorError::InvalidSolution(format!(
                    "solution has {} elements, costs have {}",
                    x.len(),
                    costs.ncols()
                )));
            }
            let value = robust_value(costs, x);
            if best.map_or(true, |(v, _)| value < v) {
                best = Some((value, x));
            }
        }
        let (upper_bound, x) = best.ok_or(GeneratorError::OracleInfeasible)?;
        Ok(OracleSolution {
            solution: x.clone(),
            upper_bound,
            nodes: self.solutions.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_robust_value_takes_worst_scenario() {
        let costs = array![[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]];
        assert_eq!(robust_value(costs.view(), &[1.0, 0.0, 0.0]), 3.0);
        assert_eq!(robust_value(costs.view(), &[1.0, 0.0, 1.0]), 4.0);
    }

    #[test]
    fn test_choose_enumerates_subsets() {
        let oracle = EnumeratedOracle::choose(4, 2);
        assert_eq!(oracle.solutions().len(), 6);
        assert!(oracle
            .solutions()
            .iter()
            .all(|x| x.iter().sum::<f64>() == 2.0));
    }

    #[test]
    fn test_enumerated_oracle_minimises_worst_case() {
        let oracle = EnumeratedOracle::choose(3, 1);
        let costs = array![[1.0, 2.0, 5.0], [4.0, 2.0, 0.0]];
        let result = oracle.solve_ip(costs.view()).unwrap();
        assert_eq!(result.solution, vec![0.0, 1.0, 0.0]);
        assert_eq!(result.upper_bound, 2.0);
        assert_eq!(result.nodes, 3);
    }

    #[test]
    fn test_empty_oracle_is_infeasible() {
        let oracle = EnumeratedOracle::new(Vec::new());
        let costs = array![[1.0]];
        assert_eq!(oracle.solve_ip(costs.view()), Err(GeneratorError::OracleInfeasible));
    }
}
