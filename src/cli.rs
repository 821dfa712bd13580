//! CLI argument parsing for ratinglift

use crate::config::{ConfigError, EstimatorConfig};
use crate::panel::{ColumnNames, LoadOptions, PanelFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Artifact format written to the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// CSV tables with a header row (default)
    Csv,
    /// JSON arrays plus a run summary document
    Json,
    /// Both CSV and JSON
    Both,
}

impl OutputFormat {
    pub fn csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }

    pub fn json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ratinglift")]
#[command(version)]
#[command(
    about = "Causal impact of practice tasks on competitive-programming ratings",
    long_about = None
)]
pub struct Cli {
    /// Enable debug tracing on stderr (RUST_LOG is honoured too)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate per-task ATT, run the placebo check and write all artifacts
    Estimate(EstimateArgs),
    /// Run only the reverse-window selection-bias check
    Placebo(PlaceboArgs),
    /// Write a deterministic synthetic panel
    Simulate(SimulateArgs),
}

/// Where the panel comes from and how to read it
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Panel file (.csv, .jsonl or .ndjson)
    #[arg(value_name = "PANEL")]
    pub input: PathBuf,

    /// Override the format inferred from the file extension
    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<PanelFormat>,

    /// Fail on out-of-order rows instead of sorting by (user, timestamp)
    #[arg(long = "assume-sorted")]
    pub assume_sorted: bool,

    /// Directory receiving the artifacts
    #[arg(short, long = "out-dir", value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Artifact format
    #[arg(long = "format", value_enum, default_value = "csv")]
    pub format: OutputFormat,
}

impl InputArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            format: self.input_format,
            columns: ColumnNames::default(),
            assume_sorted: self.assume_sorted,
        }
    }
}

/// Estimator configuration: a TOML file or preset, then individual overrides
#[derive(Args, Debug, Clone, Default)]
pub struct EstimatorArgs {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start from the exploratory preset (lower sample gates, 5% level)
    #[arg(long, conflicts_with = "config")]
    pub exploratory: bool,

    /// Forward outcome horizon in submissions
    #[arg(long, value_name = "N")]
    pub horizon: Option<usize>,

    /// Backward horizon for the placebo check
    #[arg(long = "placebo-horizon", value_name = "N")]
    pub placebo_horizon: Option<usize>,

    /// Minimum baseline outcomes per stratum
    #[arg(long = "min-baseline", value_name = "N")]
    pub min_baseline: Option<usize>,

    /// Minimum treated outcomes per (task, stratum) before joining
    #[arg(long = "min-treatment-pilot", value_name = "N")]
    pub min_treatment_pilot: Option<usize>,

    /// Minimum outcomes on both sides of a joined stratum
    #[arg(long = "min-joined", value_name = "N")]
    pub min_joined: Option<usize>,

    /// Drop stratum effects with |uplift| above this value
    #[arg(long = "max-uplift", value_name = "POINTS")]
    pub max_uplift: Option<f64>,

    /// Two-tailed significance level
    #[arg(long, value_name = "ALPHA")]
    pub significance: Option<f64>,

    /// Only count submissions with this verdict as treatment (e.g. OK)
    #[arg(long = "treatment-verdict", value_name = "VERDICT")]
    pub treatment_verdict: Option<String>,

    /// Success stories kept per significant task
    #[arg(long = "cohort-size", value_name = "N")]
    pub cohort_size: Option<usize>,
}

impl EstimatorArgs {
    /// Build and validate the effective configuration
    pub fn resolve(&self) -> Result<EstimatorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EstimatorConfig::from_file(path)?,
            None if self.exploratory => EstimatorConfig::exploratory(),
            None => EstimatorConfig::default(),
        };

        if let Some(horizon) = self.horizon {
            config.forward_horizon = horizon;
        }
        if let Some(horizon) = self.placebo_horizon {
            config.placebo_horizon = horizon;
        }
        if let Some(n) = self.min_baseline {
            config.thresholds.min_baseline = n;
        }
        if let Some(n) = self.min_treatment_pilot {
            config.thresholds.min_treatment_pilot = n;
        }
        if let Some(n) = self.min_joined {
            config.thresholds.min_joined = n;
        }
        if let Some(cap) = self.max_uplift {
            config.max_abs_uplift = cap;
        }
        if let Some(level) = self.significance {
            config.significance_level = level;
        }
        if let Some(verdict) = &self.treatment_verdict {
            config.treatment_verdict = Some(verdict.clone());
        }
        if let Some(n) = self.cohort_size {
            config.cohort_size = n;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    /// Write stratum effects for every task, not only significant ones
    #[arg(long = "all-strata")]
    pub all_strata: bool,

    /// Skip the placebo check
    #[arg(long = "no-placebo")]
    pub no_placebo: bool,
}

#[derive(Args, Debug)]
pub struct PlaceboArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Output panel file (.csv or .jsonl)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Override the format inferred from the output extension
    #[arg(long = "output-format", value_enum)]
    pub output_format: Option<PanelFormat>,

    /// Number of synthetic users
    #[arg(long, default_value = "600")]
    pub users: usize,

    /// Submissions per user
    #[arg(long, default_value = "60")]
    pub submissions: usize,

    /// RNG seed
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Rating jump planted after each boost task
    #[arg(long = "boost-gain", default_value = "60.0")]
    pub boost_gain: f64,
}
