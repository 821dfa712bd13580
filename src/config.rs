//! Estimator configuration
//!
//! Every stage of the causal pipeline receives an immutable `EstimatorConfig`
//! by reference, so several runs (e.g. a horizon sensitivity sweep) can use
//! different settings side by side.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while building or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} horizon must be at least 1 submission")]
    ZeroHorizon { name: &'static str },

    #[error("{name} must be a positive finite number, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("significance_level must be in (0, 1], got {0}")]
    SignificanceOutOfRange(f64),

    #[error("{name} thresholds must be at least 1 sample")]
    ZeroThreshold { name: &'static str },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bin widths used by coarsened exact matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketWidths {
    /// Rating points per bucket (default: 100)
    pub rating: f64,
    /// Rolling acceptance rate per bucket (default: 0.1)
    pub accuracy: f64,
    /// Rolling solved-difficulty points per bucket (default: 200)
    pub difficulty: f64,
}

impl Default for BucketWidths {
    fn default() -> Self {
        Self {
            rating: 100.0,
            accuracy: 0.1,
            difficulty: 200.0,
        }
    }
}

/// Sample-size gates applied while building stratum effects
///
/// The forward run and the placebo run carry their own copy; the two are
/// never assumed to be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleThresholds {
    /// Minimum events in a stratum for its baseline to be kept
    pub min_baseline: usize,
    /// Minimum events in a (task, stratum) group before the join
    pub min_treatment_pilot: usize,
    /// Minimum treated and baseline counts after the join
    pub min_joined: usize,
}

impl Default for SampleThresholds {
    fn default() -> Self {
        Self {
            min_baseline: 50,
            min_treatment_pilot: 10,
            min_joined: 50,
        }
    }
}

impl SampleThresholds {
    /// Thresholds used by the reverse-window placebo run
    pub fn placebo() -> Self {
        Self {
            min_baseline: 20,
            min_treatment_pilot: 20,
            min_joined: 20,
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min_baseline == 0 || self.min_treatment_pilot == 0 || self.min_joined == 0 {
            return Err(ConfigError::ZeroThreshold { name });
        }
        Ok(())
    }
}

/// Configuration for one causal estimation run
///
/// # Example
/// ```
/// use ratinglift::config::EstimatorConfig;
///
/// let config = EstimatorConfig::default();
/// assert_eq!(config.forward_horizon, 20);
/// assert_eq!(config.significance_level, 0.01);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Submissions between treatment and the measured future rating
    pub forward_horizon: usize,

    /// Submissions between the past rating and treatment (placebo outcome)
    pub placebo_horizon: usize,

    /// Coarsening widths for the three confounders
    pub buckets: BucketWidths,

    /// Sample gates for the forward run
    pub thresholds: SampleThresholds,

    /// Sample gates for the placebo run
    pub placebo_thresholds: SampleThresholds,

    /// Largest plausible per-stratum uplift in rating points
    ///
    /// Larger magnitudes are matching artifacts at small sample sizes and
    /// are dropped.
    pub max_abs_uplift: f64,

    /// Two-tailed p-value threshold for keeping a task
    pub significance_level: f64,

    /// Only submissions with this verdict count as treatment events
    ///
    /// `None` treats every submission as an attempt of its task. The baseline
    /// always uses every event.
    pub treatment_verdict: Option<String>,

    /// Number of success-story examples kept per significant task
    pub cohort_size: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            forward_horizon: 20,
            placebo_horizon: 20,
            buckets: BucketWidths::default(),
            thresholds: SampleThresholds::default(),
            placebo_thresholds: SampleThresholds::placebo(),
            max_abs_uplift: 300.0,
            significance_level: 0.01,
            treatment_verdict: None,
            cohort_size: 5,
        }
    }
}

impl EstimatorConfig {
    /// Looser gates for small panels (demo data, quick sanity checks)
    pub fn exploratory() -> Self {
        Self {
            thresholds: SampleThresholds {
                min_baseline: 20,
                min_treatment_pilot: 5,
                min_joined: 20,
            },
            placebo_thresholds: SampleThresholds {
                min_baseline: 10,
                min_treatment_pilot: 10,
                min_joined: 10,
            },
            significance_level: 0.05,
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forward_horizon == 0 {
            return Err(ConfigError::ZeroHorizon { name: "forward" });
        }
        if self.placebo_horizon == 0 {
            return Err(ConfigError::ZeroHorizon { name: "placebo" });
        }

        for (name, value) in [
            ("buckets.rating", self.buckets.rating),
            ("buckets.accuracy", self.buckets.accuracy),
            ("buckets.difficulty", self.buckets.difficulty),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        if !(self.max_abs_uplift.is_finite() && self.max_abs_uplift > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "max_abs_uplift",
                value: self.max_abs_uplift,
            });
        }

        if !(self.significance_level > 0.0 && self.significance_level <= 1.0) {
            return Err(ConfigError::SignificanceOutOfRange(
                self.significance_level,
            ));
        }

        self.thresholds.validate("forward")?;
        self.placebo_thresholds.validate("placebo")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EstimatorConfig::default();
        assert_eq!(config.forward_horizon, 20);
        assert_eq!(config.placebo_horizon, 20);
        assert_eq!(config.buckets.rating, 100.0);
        assert_eq!(config.buckets.accuracy, 0.1);
        assert_eq!(config.buckets.difficulty, 200.0);
        assert_eq!(config.thresholds.min_baseline, 50);
        assert_eq!(config.thresholds.min_treatment_pilot, 10);
        assert_eq!(config.thresholds.min_joined, 50);
        assert_eq!(config.placebo_thresholds, SampleThresholds::placebo());
        assert_eq!(config.max_abs_uplift, 300.0);
        assert_eq!(config.significance_level, 0.01);
        assert!(config.treatment_verdict.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exploratory_config() {
        let config = EstimatorConfig::exploratory();
        assert_eq!(config.thresholds.min_joined, 20);
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.forward_horizon, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let config = EstimatorConfig {
            forward_horizon: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroHorizon { name: "forward" })
        ));

        let config = EstimatorConfig {
            placebo_horizon: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroHorizon { name: "placebo" })
        ));
    }

    #[test]
    fn test_invalid_bucket_width() {
        let mut config = EstimatorConfig::default();
        config.buckets.accuracy = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "buckets.accuracy",
                ..
            })
        ));

        config.buckets.accuracy = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_significance_level() {
        for level in [0.0, -0.1, 1.5, f64::NAN] {
            let config = EstimatorConfig {
                significance_level: level,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "level {} accepted", level);
        }
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = EstimatorConfig::default();
        config.placebo_thresholds.min_joined = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroThreshold { name: "placebo" })
        ));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EstimatorConfig::from_toml_str(
            r#"
forward_horizon = 30
significance_level = 0.05

[thresholds]
min_joined = 40

[buckets]
rating = 50.0
"#,
        )
        .unwrap();

        assert_eq!(config.forward_horizon, 30);
        assert_eq!(config.placebo_horizon, 20);
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.thresholds.min_joined, 40);
        assert_eq!(config.thresholds.min_baseline, 50);
        assert_eq!(config.buckets.rating, 50.0);
        assert_eq!(config.buckets.difficulty, 200.0);
    }

    #[test]
    fn test_toml_validation_runs() {
        let result = EstimatorConfig::from_toml_str("forward_horizon = 0");
        assert!(matches!(result, Err(ConfigError::ZeroHorizon { .. })));
    }

    #[test]
    fn test_toml_syntax_error() {
        let result = EstimatorConfig::from_toml_str("forward_horizon = = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
