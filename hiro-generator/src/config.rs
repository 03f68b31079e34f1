use crate::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Random,
    Normal,
    Iterative,
    Lazy,
    Midpoint,
    MidpointLp,
    Alternating,
    AlternateHeuristic,
    LinearDecisionRule,
    ColumnGeneration,
}

impl Algorithm {
    pub const ALL: [Algorithm; 10] = [
        Algorithm::Random,
        Algorithm::Normal,
        Algorithm::Iterative,
        Algorithm::Lazy,
        Algorithm::Midpoint,
        Algorithm::MidpointLp,
        Algorithm::Alternating,
        Algorithm::AlternateHeuristic,
        Algorithm::LinearDecisionRule,
        Algorithm::ColumnGeneration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Random => "random",
            Algorithm::Normal => "normal",
            Algorithm::Iterative => "iterative",
            Algorithm::Lazy => "lazy",
            Algorithm::Midpoint => "midpoint",
            Algorithm::MidpointLp => "midpoint_lp",
            Algorithm::Alternating => "alternating",
            Algorithm::AlternateHeuristic => "alternate_heuristic",
            Algorithm::LinearDecisionRule => "linear_decision_rule",
            Algorithm::ColumnGeneration => "column_generation",
        }
    }

    /// Numeric selector, in declaration order starting at 0.
    pub fn code(&self) -> u8 {
        Self::ALL.iter().position(|a| a == self).unwrap_or(0) as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Algorithm::Lazy | Algorithm::LinearDecisionRule)
    }

    pub fn uses_oracle(&self) -> bool {
        !matches!(
            self,
            Algorithm::Random | Algorithm::Normal | Algorithm::Midpoint
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| GeneratorError::Configuration(format!("Unknown algorithm code {}", code)));
        }
        Self::ALL
            .iter()
            .find(|a| a.name() == normalized)
            .copied()
            .ok_or_else(|| GeneratorError::Configuration(format!("Unknown algorithm '{}'", s)))
    }
}

/// Settings accepted by the engine, usually read from a json string or file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub algorithm: Algorithm,
    pub num_elements: usize,
    pub num_scenarios: usize,
    #[serde(default)]
    pub scenario_budget: Option<f64>,
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_gap")]
    pub gap: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_deviation")]
    pub deviation: f64,
    #[serde(default)]
    pub lower_bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub upper_bounds: Option<Vec<f64>>,
}

fn default_time_limit_secs() -> f64 {
    3600.0
}

fn default_max_iterations() -> usize {
    100
}

fn default_gap() -> f64 {
    1e-6
}

fn default_deviation() -> f64 {
    0.5
}

impl GeneratorSettings {
    pub fn new(algorithm: Algorithm, num_elements: usize, num_scenarios: usize) -> Self {
        Self {
            algorithm,
            num_elements,
            num_scenarios,
            scenario_budget: None,
            time_limit_secs: default_time_limit_secs(),
            max_iterations: default_max_iterations(),
            gap: default_gap(),
            seed: 0,
            deviation: default_deviation(),
            lower_bounds: None,
            upper_bounds: None,
        }
    }

    pub fn time_limit(&self) -> Result<Duration, GeneratorError> {
        Duration::try_from_secs_f64(self.time_limit_secs).map_err(|e| {
            GeneratorError::Configuration(format!(
                "Invalid time limit {}: {}",
                self.time_limit_secs, e
            ))
        })
    }
}
