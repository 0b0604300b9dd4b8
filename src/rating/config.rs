use serde::{Deserialize, Serialize};

use crate::rating::types::{DEFAULT_DEVIATION, DEFAULT_RATING, DEFAULT_VOLATILITY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Glicko2Config {
    /// System constant bounding volatility change.
    pub tau: f64,
    pub default_rating: f64,
    pub default_deviation: f64,
    pub default_volatility: f64,
    /// Puzzles are rated as a fresh opponent on every attempt.
    pub puzzle_deviation: f64,
    pub min_deviation: f64,
    pub max_deviation: f64,
    pub min_volatility: f64,
    pub max_volatility: f64,
    pub convergence_tolerance: f64,
    pub max_iterations: u32,
}

impl Default for Glicko2Config {
    fn default() -> Self {
        Self {
            tau: 0.5,
            default_rating: DEFAULT_RATING,
            default_deviation: DEFAULT_DEVIATION,
            default_volatility: DEFAULT_VOLATILITY,
            puzzle_deviation: DEFAULT_DEVIATION,
            min_deviation: 1.0,
            max_deviation: DEFAULT_DEVIATION,
            min_volatility: 1e-4,
            max_volatility: 1.0,
            convergence_tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    /// Attempts below this count use the calibration step table.
    pub calibration_attempts: u64,
    /// How many recent attempts feed the calibration trend.
    pub trend_window: usize,
    pub min_target_rating: f64,
    pub max_target_rating: f64,
    /// Relative half-widths tried in order once calibration is over.
    pub steady_bands: Vec<f64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            calibration_attempts: 10,
            trend_window: 5,
            min_target_rating: 800.0,
            max_target_rating: 2400.0,
            steady_bands: vec![0.05, 0.10, 0.15, 0.20, 0.30, 0.50, 0.75, 1.00],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub glicko: Glicko2Config,
    pub selector: SelectorConfig,
}

impl EngineConfig {
    pub fn from_env(env_config: &crate::config::RatingEnvConfig) -> Self {
        let mut config = Self::default();
        config.glicko.tau = env_config.tau;
        config.glicko.max_iterations = env_config.max_iterations;
        config.selector.calibration_attempts = env_config.calibration_attempts;
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        let g = &self.glicko;
        if !(g.tau.is_finite() && g.tau > 0.0) {
            return Err("glicko.tau must be > 0".to_string());
        }
        if !(g.min_deviation > 0.0 && g.min_deviation <= g.max_deviation) {
            return Err("glicko deviation bounds must satisfy 0 < min <= max".to_string());
        }
        if !(g.min_volatility > 0.0 && g.min_volatility <= g.max_volatility) {
            return Err("glicko volatility bounds must satisfy 0 < min <= max".to_string());
        }
        if !(g.default_deviation > 0.0 && g.default_volatility > 0.0) {
            return Err("glicko defaults must be positive".to_string());
        }
        if !(g.puzzle_deviation > 0.0) {
            return Err("glicko.puzzle_deviation must be positive".to_string());
        }
        if !(g.convergence_tolerance > 0.0) {
            return Err("glicko.convergence_tolerance must be > 0".to_string());
        }
        if g.max_iterations == 0 {
            return Err("glicko.max_iterations must be >= 1".to_string());
        }

        let s = &self.selector;
        if s.trend_window == 0 {
            return Err("selector.trend_window must be >= 1".to_string());
        }
        if s.min_target_rating > s.max_target_rating {
            return Err("selector target bounds are inverted".to_string());
        }
        if s.steady_bands.is_empty() {
            return Err("selector.steady_bands must not be empty".to_string());
        }
        if s.steady_bands.windows(2).any(|w| w[0] >= w[1]) {
            return Err("selector.steady_bands must be strictly increasing".to_string());
        }
        if s.steady_bands.iter().any(|p| !(*p > 0.0)) {
            return Err("selector.steady_bands must be positive".to_string());
        }
        Ok(())
    }
}
