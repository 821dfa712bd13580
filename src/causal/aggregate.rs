// Baseline and treatment aggregation per stratum
//
// Baseline: every outcome in a stratum, standing in for "a user in this
// state doing any task". Any single task is rare relative to all activity,
// so the marginal population approximates the untreated counterfactual.
//
// Treatment: outcomes of one task within a stratum.

use crate::causal::bucket::StratumKey;
use crate::causal::outcome::Outcome;
use crate::config::{BucketWidths, SampleThresholds};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// Summary of the outcome distribution within one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Mean rating gain
    pub mean: f64,
    /// Population standard deviation of the gain
    pub std: f64,
    /// Number of outcomes
    pub count: u64,
    /// Share of outcomes with a positive gain
    pub improve_rate: f64,
}

impl GroupStats {
    /// Squared standard error of the mean (`std² / count`)
    pub fn mean_variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.std * self.std / self.count as f64
    }
}

/// Streaming mean/variance accumulator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    improved: u64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, gain: f64, improved: bool) {
        self.count += 1;
        let delta = gain - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (gain - self.mean);
        if improved {
            self.improved += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finalize into `GroupStats`; `None` for an empty accumulator
    pub fn finish(&self) -> Option<GroupStats> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(GroupStats {
            mean: self.mean,
            std: (self.m2 / n).max(0.0).sqrt(),
            count: self.count,
            improve_rate: self.improved as f64 / n,
        })
    }
}

/// Arithmetic mean in f64; `None` for an empty input
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut acc = StatsAccumulator::new();
    for value in values {
        acc.push(value, false);
    }
    acc.finish().map(|stats| stats.mean)
}

/// Baseline statistics keyed by stratum
pub type BaselineTable = FnvHashMap<StratumKey, GroupStats>;

/// Treatment statistics keyed by (task id, stratum)
pub type TreatmentTable<'a> = FnvHashMap<(&'a str, StratumKey), GroupStats>;

/// Per-stratum statistics over all outcomes, gated by `min_baseline`
pub fn baseline_stats(
    outcomes: &[Outcome<'_>],
    widths: &BucketWidths,
    thresholds: &SampleThresholds,
) -> BaselineTable {
    let mut groups: FnvHashMap<StratumKey, StatsAccumulator> = FnvHashMap::default();
    for outcome in outcomes {
        groups
            .entry(StratumKey::for_event(outcome.event, widths))
            .or_default()
            .push(outcome.gain, outcome.improved);
    }

    let total = groups.len();
    let table: BaselineTable = groups
        .into_iter()
        .filter(|(_, acc)| acc.count() >= thresholds.min_baseline as u64)
        .filter_map(|(key, acc)| acc.finish().map(|stats| (key, stats)))
        .collect();

    tracing::debug!(
        strata = total,
        kept = table.len(),
        min_baseline = thresholds.min_baseline,
        "Baseline strata aggregated"
    );

    table
}

/// Per-(task, stratum) statistics, gated by `min_treatment_pilot`
///
/// With `verdict` set, only outcomes of submissions carrying that verdict
/// count as treatment events.
pub fn treatment_stats<'a>(
    outcomes: &[Outcome<'a>],
    widths: &BucketWidths,
    thresholds: &SampleThresholds,
    verdict: Option<&str>,
) -> TreatmentTable<'a> {
    let mut groups: FnvHashMap<(&'a str, StratumKey), StatsAccumulator> = FnvHashMap::default();
    for outcome in outcomes {
        if let Some(required) = verdict {
            if outcome.event.verdict != required {
                continue;
            }
        }
        let key = (
            outcome.event.task_id.as_str(),
            StratumKey::for_event(outcome.event, widths),
        );
        groups
            .entry(key)
            .or_default()
            .push(outcome.gain, outcome.improved);
    }

    let total = groups.len();
    let table: TreatmentTable<'a> = groups
        .into_iter()
        .filter(|(_, acc)| acc.count() >= thresholds.min_treatment_pilot as u64)
        .filter_map(|(key, acc)| acc.finish().map(|stats| (key, stats)))
        .collect();

    tracing::debug!(
        groups = total,
        kept = table.len(),
        min_treatment_pilot = thresholds.min_treatment_pilot,
        "Treatment groups aggregated"
    );

    table
}
