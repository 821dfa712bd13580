// Causal effect estimation by coarsened exact matching
//
// Pipeline for one run:
//   panel -> outcomes (forward window) -> stratum keys
//         -> baseline stats per stratum + treatment stats per (task, stratum)
//         -> stratum effects (inner join, count gates, uplift cap)
//         -> per-task ATT with propagated variance
//         -> z-score / two-tailed p-value -> significant tasks
//
// The placebo validator replays the same matching pass on a backward window
// to estimate selection bias per task.
//
// Limits: the control group is the whole population in a stratum, not the
// users who skipped a task; confounding outside the three bucketed
// confounders is not addressed.

mod aggregate;
mod att;
mod bucket;
mod effect;
mod matching;
mod outcome;
mod placebo;
mod significance;

pub use aggregate::{
    baseline_stats, mean, treatment_stats, BaselineTable, GroupStats, StatsAccumulator, TreatmentTable,
};
pub use att::{aggregate_att, aggregate_task, stratum_weights, AttEstimate};
pub use bucket::{bucket, StratumKey};
pub use effect::{combine_effects, EffectRecord};
pub use matching::{match_outcomes, match_panel, MatchedEffects};
pub use outcome::{derive_outcomes, Outcome, OutcomeWindow};
pub use placebo::{run_placebo, BiasRecord, PlaceboReport};
pub use significance::{
    normal_cdf, select_significant, test_estimate, two_tailed_p_value, ProblemEffect,
    SignificanceSummary,
};
