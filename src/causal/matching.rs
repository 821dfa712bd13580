// Shared matching pipeline: outcomes -> strata -> effects -> per-task ATT
//
// The forward estimate and the placebo audit run exactly this sequence; only
// the outcome window and the sample gates differ.

use crate::causal::aggregate::{baseline_stats, treatment_stats};
use crate::causal::att::{aggregate_att, AttEstimate};
use crate::causal::effect::{combine_effects, EffectRecord};
use crate::causal::outcome::{derive_outcomes, Outcome, OutcomeWindow};
use crate::config::{EstimatorConfig, SampleThresholds};
use crate::panel::Panel;

/// Output of one matching pass
#[derive(Debug, Clone, Default)]
pub struct MatchedEffects {
    /// Surviving (task, stratum) effects ordered by task then stratum
    pub effects: Vec<EffectRecord>,
    /// One estimate per task with at least one surviving stratum
    pub estimates: Vec<AttEstimate>,
    /// Outcomes that entered the pass
    pub outcomes: usize,
    /// Baseline strata passing `min_baseline`
    pub baseline_strata: usize,
    /// Treatment groups passing `min_treatment_pilot`
    pub treatment_groups: usize,
}

/// Match already-derived outcomes and aggregate them per task
pub fn match_outcomes(
    outcomes: &[Outcome<'_>],
    config: &EstimatorConfig,
    thresholds: &SampleThresholds,
) -> MatchedEffects {
    let baseline = baseline_stats(outcomes, &config.buckets, thresholds);
    let treatment = treatment_stats(
        outcomes,
        &config.buckets,
        thresholds,
        config.treatment_verdict.as_deref(),
    );

    let effects = combine_effects(&treatment, &baseline, thresholds, config.max_abs_uplift);
    let estimates = aggregate_att(&effects);

    MatchedEffects {
        outcomes: outcomes.len(),
        baseline_strata: baseline.len(),
        treatment_groups: treatment.len(),
        effects,
        estimates,
    }
}

/// Derive outcomes for `window` and run the matching pass over them
pub fn match_panel(
    panel: &Panel,
    window: OutcomeWindow,
    config: &EstimatorConfig,
    thresholds: &SampleThresholds,
) -> MatchedEffects {
    let outcomes = derive_outcomes(panel, window);
    match_outcomes(&outcomes, config, thresholds)
}
