//! Pipeline driver: one full estimation run over a panel
//!
//! Stages run in order and each hands a fixed-shape table to the next:
//! forward matching, significance filter, cohort extraction and (optionally)
//! the placebo audit. Nothing here mutates the panel, so several runs with
//! different configurations can share one loaded panel.

use crate::causal::{
    derive_outcomes, match_outcomes, mean, run_placebo, select_significant, EffectRecord, OutcomeWindow,
    PlaceboReport, ProblemEffect,
};
use crate::cohort::{extract_cohorts, CohortExample};
use crate::config::{ConfigError, EstimatorConfig};
use crate::panel::Panel;
use std::collections::HashSet;

/// Which optional stages to run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run the reverse-window placebo audit
    pub placebo: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { placebo: true }
    }
}

/// Everything one run produces
#[derive(Debug, Clone, Default)]
pub struct CausalReport {
    /// Every surviving stratum effect, ordered by task then stratum
    pub effects: Vec<EffectRecord>,
    /// Significant tasks, ATT descending
    pub significant: Vec<ProblemEffect>,
    /// Tasks with a usable standard error
    pub tested: usize,
    /// Tasks excluded for zero or non-finite standard error
    pub degenerate: usize,
    /// Placebo audit, when requested
    pub bias: Option<PlaceboReport>,
    /// Success stories for significant tasks
    pub cohorts: Vec<CohortExample>,
    /// Counters for the text report
    pub stats: RunStats,
}

/// Row counts observed along the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events: usize,
    pub users: usize,
    pub outcomes: usize,
    pub baseline_strata: usize,
    pub treatment_groups: usize,
    pub stratum_effects: usize,
    pub tasks_estimated: usize,
}

impl CausalReport {
    /// Stratum effects for the detailed table
    ///
    /// Restricted to significant tasks unless `all_strata` is set.
    pub fn detailed_effects(&self, all_strata: bool) -> Vec<&EffectRecord> {
        if all_strata {
            return self.effects.iter().collect();
        }
        let keep: HashSet<&str> = self.significant.iter().map(|e| e.task_id.as_str()).collect();
        self.effects
            .iter()
            .filter(|e| keep.contains(e.task_id.as_str()))
            .collect()
    }

    /// Mean ATT over the significant tasks
    pub fn mean_att(&self) -> Option<f64> {
        mean(self.significant.iter().map(|e| e.att_score))
    }
}

/// Run the estimator over a panel
pub fn run_pipeline(
    panel: &Panel,
    config: &EstimatorConfig,
    options: RunOptions,
) -> Result<CausalReport, ConfigError> {
    config.validate()?;

    let window = OutcomeWindow::Forward(config.forward_horizon);
    let outcomes = derive_outcomes(panel, window);
    let matched = match_outcomes(&outcomes, config, &config.thresholds);

    tracing::info!(
        events = panel.len(),
        outcomes = matched.outcomes,
        strata = matched.effects.len(),
        tasks = matched.estimates.len(),
        "Forward matching complete"
    );

    // Materialization point: p-values need the realized per-task estimates
    let summary = select_significant(&matched.estimates, config.significance_level);

    let significant_ids: Vec<&str> = summary
        .significant
        .iter()
        .map(|e| e.task_id.as_str())
        .collect();

    let stats = RunStats {
        events: panel.len(),
        users: panel.user_count(),
        outcomes: matched.outcomes,
        baseline_strata: matched.baseline_strata,
        treatment_groups: matched.treatment_groups,
        stratum_effects: matched.effects.len(),
        tasks_estimated: matched.estimates.len(),
    };

    let cohorts = extract_cohorts(
        &outcomes,
        window,
        &significant_ids,
        config.treatment_verdict.as_deref(),
        config.cohort_size,
    );
    tracing::debug!(examples = cohorts.len(), "Cohort examples extracted");

    let bias = options.placebo.then(|| run_placebo(panel, config));

    Ok(CausalReport {
        effects: matched.effects,
        significant: summary.significant,
        tested: summary.tested,
        degenerate: summary.degenerate,
        bias,
        cohorts,
        stats,
    })
}
