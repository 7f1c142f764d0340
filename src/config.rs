//! Optimizer configuration.
//!
//! Loaded from a TOML file so weights, budgets and the coverage policy can be
//! tuned without code changes. Every field has a default, so an empty file
//! (or no file at all) yields a working configuration.
//!
//! ```
//! use shift_optimizer::config::{CoveragePolicy, OptimizerConfig};
//! use std::time::Duration;
//!
//! let config = OptimizerConfig::from_toml_str(r#"
//!     [solver]
//!     coverage = "full"
//!     time_limit_ms = 5000
//!
//!     [weights]
//!     fairness = 2.5
//! "#).unwrap();
//!
//! assert_eq!(config.solver.coverage, CoveragePolicy::Full);
//! assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(5)));
//! assert_eq!(config.weights.fairness, 2.5);
//! assert_eq!(config.weights.prefer_shift, 10);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SHIFT_OPTIMIZER_CONFIG";

/// Configuration file used when the environment variable is unset.
pub const DEFAULT_CONFIG_PATH: &str = "optimizer.toml";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub server: ServerConfig,
    pub solver: SolverConfig,
    pub weights: ObjectiveWeights,
    pub cache: CacheConfig,
}

impl OptimizerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `SHIFT_OPTIMIZER_CONFIG` (or `optimizer.toml`).
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        match Self::from_toml_file(&path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "No configuration file found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Rejects values the solver cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ls = &self.solver.local_search;
        if self.solver.max_solutions_limit == 0 {
            return Err(ConfigError::Invalid("solver.max_solutions_limit must be at least 1".into()));
        }
        if self.solver.leaf_limit == 0 {
            return Err(ConfigError::Invalid("solver.leaf_limit must be at least 1".into()));
        }
        if ls.late_acceptance_size == 0 {
            return Err(ConfigError::Invalid(
                "solver.local_search.late_acceptance_size must be at least 1".into(),
            ));
        }
        if ls.moves_per_step == 0 {
            return Err(ConfigError::Invalid(
                "solver.local_search.moves_per_step must be at least 1".into(),
            ));
        }
        let w = &self.weights;
        let non_negative = [
            ("weights.coverage", w.coverage),
            ("weights.fairness", w.fairness),
            ("weights.rest_threshold_hours", w.rest_threshold_hours),
            ("weights.rest_penalty_per_hour", w.rest_penalty_per_hour),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a non-negative number")));
            }
        }
        if w.prefer_shift < 0 || w.prefer_period < 0 || w.unavailable < 0 {
            return Err(ConfigError::Invalid("preference weights must be non-negative".into()));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Whether every shift must be staffed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Shifts nobody can work are left out of the assignment.
    #[default]
    Partial,
    /// Every shift must be assigned; otherwise the problem is infeasible.
    Full,
}

/// Search budgets and policies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    pub coverage: CoveragePolicy,
    /// Wall-clock limit per solve call in milliseconds; 0 disables the deadline.
    pub time_limit_ms: u64,
    /// Maximum nodes explored by the construction phase.
    pub node_limit: u64,
    /// Maximum complete assignments collected by the construction phase.
    pub leaf_limit: usize,
    pub random_seed: u64,
    /// Upper bound accepted for `max_solutions`.
    pub max_solutions_limit: usize,
    pub local_search: LocalSearchConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            coverage: CoveragePolicy::Partial,
            time_limit_ms: 60_000,
            node_limit: 200_000,
            leaf_limit: 10_000,
            random_seed: 0,
            max_solutions_limit: 100,
            local_search: LocalSearchConfig::default(),
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }
}

/// Late acceptance local search settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalSearchConfig {
    /// Number of independent chains; 0 disables local search.
    pub chains: usize,
    pub step_limit: u64,
    /// Stop a chain after this many steps without a new best.
    pub unimproved_step_limit: u64,
    pub late_acceptance_size: usize,
    /// Moves tried per step before the step is given up.
    pub moves_per_step: usize,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            step_limit: 5_000,
            unimproved_step_limit: 1_000,
            late_acceptance_size: 400,
            moves_per_step: 64,
        }
    }
}

/// Weights of the ranking objective.
///
/// objective = coverage × assigned + soft preference score
///           + fairness × fairness score × 100 − rest penalty
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub coverage: f64,
    pub prefer_shift: i64,
    pub prefer_period: i64,
    /// Subtracted for every violated soft unavailability.
    pub unavailable: i64,
    pub fairness: f64,
    pub rest_threshold_hours: f64,
    pub rest_penalty_per_hour: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            coverage: 1000.0,
            prefer_shift: 10,
            prefer_period: 10,
            unavailable: 10,
            fairness: 1.0,
            rest_threshold_hours: 12.0,
            rest_penalty_per_hour: 1.0,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cached responses kept; 0 disables the cache.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = OptimizerConfig::from_toml_str("").unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(config.solver.coverage, CoveragePolicy::Partial);
        assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(60)));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = OptimizerConfig::from_toml_str(
            r#"
            [solver.local_search]
            chains = 1

            [cache]
            capacity = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.local_search.chains, 1);
        assert_eq!(config.solver.local_search.late_acceptance_size, 400);
        assert_eq!(config.cache.capacity, 0);
        assert_eq!(config.weights, ObjectiveWeights::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = OptimizerConfig::from_toml_str("[weights]\nfairness = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = OptimizerConfig::from_toml_str("[solver]\nmax_solutions_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = OptimizerConfig::from_toml_str("[solver\ncoverage = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_unknown_coverage_policy() {
        assert!(OptimizerConfig::from_toml_str("[solver]\ncoverage = \"most\"").is_err());
    }
}
