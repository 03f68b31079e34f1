use crate::error::GeneratorError;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tolerance used when clamping finished cost matrices into the box.
pub const BOUND_TOLERANCE: f64 = 1e-6;

/// Budgeted box `{ c : lower <= c <= upper, Σ c <= budget }` shared by every
/// scenario.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UncertaintySet {
    lower: Vec<f64>,
    upper: Vec<f64>,
    nominal: Vec<f64>,
    budget: f64,
}

impl UncertaintySet {
    /// Without a budget the set is the plain box (budget `Σ upper`).
    pub fn new(lower: Vec<f64>, upper: Vec<f64>, budget: Option<f64>) -> Result<Self, GeneratorError> {
        let nominal = lower.iter().zip(&upper).map(|(l, u)| 0.5 * (l + u)).collect();
        Self::with_nominal(lower, upper, nominal, budget)
    }

    fn with_nominal(
        lower: Vec<f64>,
        upper: Vec<f64>,
        nominal: Vec<f64>,
        budget: Option<f64>,
    ) -> Result<Self, GeneratorError> {
        if lower.len() != upper.len() {
            return Err(GeneratorError::Configuration(format!(
                "{} lower bounds but {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }
        for (i, (&l, &u)) in lower.iter().zip(&upper).enumerate() {
            if !(l.is_finite() && u.is_finite() && 0.0 <= l && l <= u) {
                return Err(GeneratorError::Configuration(format!(
                    "element {} has invalid bounds [{}, {}]",
                    i, l, u
                )));
            }
        }
        let lower_sum: f64 = lower.iter().sum();
        let budget = budget.unwrap_or_else(|| upper.iter().sum());
        if !budget.is_finite() || budget < lower_sum - BOUND_TOLERANCE {
            return Err(GeneratorError::Configuration(format!(
                "scenario budget {} is below the sum of lower bounds {}",
                budget, lower_sum
            )));
        }
        Ok(Self {
            lower,
            upper,
            nominal,
            budget,
        })
    }

    /// Draws nominal costs uniformly from `1..=100` and derives the bounds
    /// `nominal * (1 ∓ deviation)`. The budget defaults to `Σ nominal`.
    pub fn generate<R: Rng>(
        rng: &mut R,
        num_elements: usize,
        deviation: f64,
        budget: Option<f64>,
    ) -> Result<Self, GeneratorError> {
        if !(0.0..=1.0).contains(&deviation) {
            return Err(GeneratorError::Configuration(format!(
                "deviation must be within [0, 1], got {}",
                deviation
            )));
        }
        let nominal: Vec<f64> = (0..num_elements)
            .map(|_| rng.gen_range(1..=100u32) as f64)
            .collect();
        let lower = nominal.iter().map(|c| (c * (1.0 - deviation)).max(0.0)).collect();
        let upper = nominal.iter().map(|c| c * (1.0 + deviation)).collect();
        let budget = budget.unwrap_or_else(|| nominal.iter().sum());
        Self::with_nominal(lower, upper, nominal, Some(budget))
    }

    pub fn num_elements(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn nominal(&self) -> &[f64] {
        &self.nominal
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn midpoint(&self) -> Vec<f64> {
        let row = self
            .lower
            .iter()
            .zip(&self.upper)
            .map(|(l, u)| 0.5 * (l + u))
            .collect();
        self.fit_budget(row)
    }

    /// Pulls `row` towards `lower` until it meets the budget. Rows already
    /// within budget are returned unchanged.
    pub fn fit_budget(&self, mut row: Vec<f64>) -> Vec<f64> {
        let total: f64 = row.iter().sum();
        if total <= self.budget {
            return row;
        }
        let lower_sum: f64 = self.lower.iter().sum();
        let excess = total - lower_sum;
        let theta = if excess > 0.0 {
            ((self.budget - lower_sum) / excess).clamp(0.0, 1.0)
        } else {
            0.0
        };
        for (value, &l) in row.iter_mut().zip(&self.lower) {
            *value = l + theta * (*value - l);
        }
        row
    }

    /// Maximiser of `direction · c` over the set: starting from `lower`, the
    /// remaining budget goes to the elements with the largest positive
    /// coefficients first. Ties keep index order.
    pub fn maximize(&self, direction: &[f64]) -> Vec<f64> {
        let mut row = self.lower.clone();
        let mut remaining = self.budget - self.lower.iter().sum::<f64>();
        let mut order: Vec<usize> = (0..self.num_elements())
            .filter(|&i| direction.get(i).is_some_and(|&g| g > 0.0))
            .collect();
        order.sort_by(|&a, &b| direction[b].total_cmp(&direction[a]));
        for i in order {
            if remaining <= 0.0 {
                break;
            }
            let step = (self.upper[i] - self.lower[i]).min(remaining);
            row[i] += step;
            remaining -= step;
        }
        row
    }

    pub fn contains(&self, row: &[f64], tolerance: f64) -> bool {
        row.len() == self.num_elements()
            && row
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&c, (&l, &u))| c >= l - tolerance && c <= u + tolerance)
            && row.iter().sum::<f64>() <= self.budget + tolerance
    }

    /// Clamps numerical noise of at most [`BOUND_TOLERANCE`] into the box.
    pub fn enforce(&self, costs: &mut Array2<f64>) -> Result<(), GeneratorError> {
        if costs.ncols() != self.num_elements() {
            return Err(GeneratorError::Configuration(format!(
                "cost matrix has {} columns, expected {}",
                costs.ncols(),
                self.num_elements()
            )));
        }
        for ((scenario, element), value) in costs.indexed_iter_mut() {
            let (l, u) = (self.lower[element], self.upper[element]);
            if !value.is_finite() || *value < l - BOUND_TOLERANCE || *value > u + BOUND_TOLERANCE {
                return Err(GeneratorError::BoundsViolated {
                    scenario,
                    element,
                    value: *value,
                    lower: l,
                    upper: u,
                });
            }
            *value = value.clamp(l, u);
        }
        Ok(())
    }
}
