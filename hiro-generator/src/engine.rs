use crate::{
    config::{Algorithm, GeneratorSettings},
    error::GeneratorError,
    oracle::Oracle,
    strategies::{alternating, column_generation, iterative, midpoint, sampling, SearchContext},
    uncertainty::UncertaintySet,
};
use ndarray::{Array2, Axis};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Statistics of one `generate_hard_instance` run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub algorithm: Algorithm,
    pub iterations: usize,
    pub oracle_calls: usize,
    pub oracle_nodes: u64,
    /// Robust value of the returned instance, when the strategy evaluated it.
    pub objective: Option<f64>,
    /// Last master bound of the exact strategies.
    pub upper_bound: Option<f64>,
    pub certified: bool,
    pub converged: bool,
    /// Master bounds, one entry per round.
    pub bound_history: Vec<Vec<f64>>,
    pub elapsed_secs: f64,
}

impl GenerationReport {
    fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            iterations: 0,
            oracle_calls: 0,
            oracle_nodes: 0,
            objective: None,
            upper_bound: None,
            certified: false,
            converged: false,
            bound_history: Vec::new(),
            elapsed_secs: 0.0,
        }
    }
}

/// A finished instance together with the set it was drawn from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HardInstance {
    pub algorithm: Algorithm,
    pub num_elements: usize,
    pub num_scenarios: usize,
    pub uncertainty: UncertaintySet,
    pub costs: Vec<Vec<f64>>,
    pub report: GenerationReport,
}

impl HardInstance {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn cost_matrix(&self) -> Result<Array2<f64>, GeneratorError> {
        let flat: Vec<f64> = self.costs.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.num_scenarios, self.num_elements), flat).map_err(|e| {
            GeneratorError::Configuration(format!(
                "costs do not form a {}x{} matrix: {}",
                self.num_scenarios, self.num_elements, e
            ))
        })
    }
}

pub struct HardInstanceGenerator<O: Oracle> {
    oracle: O,
    algorithm: Option<Algorithm>,
    num_elements: Option<usize>,
    num_scenarios: Option<usize>,
    budget: Option<f64>,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
    time_limit: Duration,
    max_iterations: usize,
    gap: f64,
    seed: u64,
    deviation: f64,
    uncertainty: Option<UncertaintySet>,
    costs: Option<Array2<f64>>,
    report: Option<GenerationReport>,
}

impl<O: Oracle> HardInstanceGenerator<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            algorithm: None,
            num_elements: None,
            num_scenarios: None,
            budget: None,
            bounds: None,
            time_limit: Duration::from_secs(3600),
            max_iterations: 100,
            gap: 1e-6,
            seed: 0,
            deviation: 0.5,
            uncertainty: None,
            costs: None,
            report: None,
        }
    }

    pub fn from_settings(oracle: O, settings: &GeneratorSettings) -> Result<Self, GeneratorError> {
        let mut generator = Self::new(oracle);
        generator.set_problem(settings.algorithm, settings.num_elements, settings.num_scenarios);
        generator.set_time_limit(settings.time_limit()?);
        generator.set_max_iterations(settings.max_iterations);
        generator.set_gap(settings.gap);
        generator.set_seed(settings.seed);
        generator.set_deviation(settings.deviation);
        if let Some(budget) = settings.scenario_budget {
            generator.set_budget(budget);
        }
        match (&settings.lower_bounds, &settings.upper_bounds) {
            (Some(lower), Some(upper)) => generator.set_bounds(lower.clone(), upper.clone()),
            (None, None) => {}
            _ => {
                return Err(GeneratorError::Configuration(
                    "lower_bounds and upper_bounds must be given together".to_string(),
                ))
            }
        }
        Ok(generator)
    }

    pub fn set_problem(&mut self, algorithm: Algorithm, num_elements: usize, num_scenarios: usize) {
        self.set_algorithm(algorithm);
        self.set_num_elements(num_elements);
        self.set_num_scenarios(num_scenarios);
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = Some(algorithm);
    }

    pub fn set_num_elements(&mut self, num_elements: usize) {
        self.num_elements = Some(num_elements);
    }

    pub fn set_num_scenarios(&mut self, num_scenarios: usize) {
        self.num_scenarios = Some(num_scenarios);
    }

    pub fn set_budget(&mut self, budget: f64) {
        self.budget = Some(budget);
    }

    pub fn set_time_limit(&mut self, time_limit: Duration) {
        self.time_limit = time_limit;
    }

    /// Explicit per-element bounds replacing the generated ones.
    pub fn set_bounds(&mut self, lower: Vec<f64>, upper: Vec<f64>) {
        self.bounds = Some((lower, upper));
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    pub fn set_gap(&mut self, gap: f64) {
        self.gap = gap;
    }

    pub fn set_deviation(&mut self, deviation: f64) {
        self.deviation = deviation;
    }

    /// Runs the configured strategy. The previous instance is discarded first,
    /// so on error no matrix is available.
    pub fn generate_hard_instance(&mut self) -> Result<GenerationReport, GeneratorError> {
        self.costs = None;
        self.report = None;
        self.uncertainty = None;

        let (algorithm, n, num_scenarios) = match (self.algorithm, self.num_elements, self.num_scenarios) {
            (Some(a), Some(n), Some(s)) => (a, n, s),
            _ => {
                return Err(GeneratorError::Configuration(
                    "algorithm, element count and scenario count must be set before generation".to_string(),
                ))
            }
        };
        if n == 0 || num_scenarios == 0 {
            return Err(GeneratorError::Configuration(format!(
                "element count ({}) and scenario count ({}) must be positive",
                n, num_scenarios
            )));
        }
        if self.gap.is_nan() || self.gap < 0.0 {
            return Err(GeneratorError::Configuration(format!("invalid gap {}", self.gap)));
        }

        let mut rng = SmallRng::seed_from_u64(self.seed);
        let uncertainty = match &self.bounds {
            Some((lower, upper)) => {
                if lower.len() != n {
                    return Err(GeneratorError::Configuration(format!(
                        "{} bounds given for {} elements",
                        lower.len(),
                        n
                    )));
                }
                UncertaintySet::new(lower.clone(), upper.clone(), self.budget)?
            }
            None => UncertaintySet::generate(&mut rng, n, self.deviation, self.budget)?,
        };

        info!(
            "generating {} instance: {} elements, {} scenarios, budget {:.3}",
            algorithm,
            n,
            num_scenarios,
            uncertainty.budget()
        );
        let start = Instant::now();
        let ctx = SearchContext {
            oracle: &self.oracle,
            uncertainty: &uncertainty,
            num_scenarios,
            deadline: start.checked_add(self.time_limit),
            max_iterations: self.max_iterations,
            gap: self.gap,
        };
        let mut report = GenerationReport::new(algorithm);
        let mut costs = match algorithm {
            Algorithm::Random => sampling::generate_uniform(&mut rng, &uncertainty, num_scenarios),
            Algorithm::Normal => sampling::generate_normal(&mut rng, &uncertainty, num_scenarios),
            Algorithm::Midpoint => midpoint::generate(&ctx),
            Algorithm::MidpointLp => midpoint::generate_lp(&ctx, &mut report)?,
            Algorithm::Iterative => iterative::run(&ctx, &mut report)?,
            Algorithm::ColumnGeneration => column_generation::run(&ctx, &mut report)?,
            Algorithm::Alternating => alternating::run(&ctx, &mut report, Some(1))?,
            Algorithm::AlternateHeuristic => alternating::run(&ctx, &mut report, None)?,
            Algorithm::Lazy | Algorithm::LinearDecisionRule => {
                return Err(GeneratorError::Unsupported(algorithm))
            }
        };
        uncertainty.enforce(&mut costs)?;
        report.elapsed_secs = start.elapsed().as_secs_f64();

        if algorithm.uses_oracle() && !report.certified && !report.converged {
            warn!(
                "{} stopped after {} iterations without converging",
                algorithm, report.iterations
            );
        }
        info!(
            "generated instance in {:.3}s: objective {:?}, {} oracle calls",
            report.elapsed_secs, report.objective, report.oracle_calls
        );

        self.uncertainty = Some(uncertainty);
        self.costs = Some(costs);
        self.report = Some(report.clone());
        Ok(report)
    }

    pub fn costs(&self) -> Option<&Array2<f64>> {
        self.costs.as_ref()
    }

    pub fn nominal_costs(&self) -> Option<&[f64]> {
        self.uncertainty.as_ref().map(|u| u.nominal())
    }

    pub fn uncertainty(&self) -> Option<&UncertaintySet> {
        self.uncertainty.as_ref()
    }

    pub fn num_elements(&self) -> Option<usize> {
        self.num_elements
    }

    pub fn num_scenarios(&self) -> Option<usize> {
        self.num_scenarios
    }

    pub fn report(&self) -> Option<&GenerationReport> {
        self.report.as_ref()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Snapshot of the last generated instance.
    pub fn instance(&self) -> Option<HardInstance> {
        let costs = self.costs.as_ref()?;
        Some(HardInstance {
            algorithm: self.report.as_ref()?.algorithm,
            num_elements: costs.ncols(),
            num_scenarios: costs.nrows(),
            uncertainty: self.uncertainty.clone()?,
            costs: costs.axis_iter(Axis(0)).map(|row| row.to_vec()).collect(),
            report: self.report.clone()?,
        })
    }
}
