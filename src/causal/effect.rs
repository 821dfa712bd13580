// Effect combiner: treatment vs. baseline within each stratum
//
// Inner join on stratum key. A stratum present on only one side is skipped
// silently; that is expected whenever a task is rare in some state.

use crate::causal::aggregate::{BaselineTable, GroupStats, TreatmentTable};
use crate::causal::bucket::StratumKey;
use crate::config::SampleThresholds;
use serde::{Deserialize, Serialize};

/// Per-(task, stratum) effect after the join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub task_id: String,
    pub rating_bucket: i32,
    pub accuracy_bucket: i32,
    pub difficulty_bucket: i32,
    pub treated_gain: f64,
    pub treated_std: f64,
    pub treated_count: u64,
    pub treated_improve_prob: f64,
    pub baseline_gain: f64,
    pub baseline_std: f64,
    pub baseline_count: u64,
    pub baseline_improve_prob: f64,
    /// Treated mean minus baseline mean
    pub uplift: f64,
    /// Variance of the difference of two independent sample means
    pub bucket_variance: f64,
    /// Treated improvement rate minus baseline improvement rate
    pub probability_uplift: f64,
}

impl EffectRecord {
    /// Build the record for one matched stratum
    pub fn from_stats(
        task_id: &str,
        stratum: StratumKey,
        treated: &GroupStats,
        baseline: &GroupStats,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            rating_bucket: stratum.rating,
            accuracy_bucket: stratum.accuracy,
            difficulty_bucket: stratum.difficulty,
            treated_gain: treated.mean,
            treated_std: treated.std,
            treated_count: treated.count,
            treated_improve_prob: treated.improve_rate,
            baseline_gain: baseline.mean,
            baseline_std: baseline.std,
            baseline_count: baseline.count,
            baseline_improve_prob: baseline.improve_rate,
            uplift: treated.mean - baseline.mean,
            bucket_variance: treated.mean_variance() + baseline.mean_variance(),
            probability_uplift: treated.improve_rate - baseline.improve_rate,
        }
    }

    pub fn stratum(&self) -> StratumKey {
        StratumKey::new(
            self.rating_bucket,
            self.accuracy_bucket,
            self.difficulty_bucket,
        )
    }
}

/// Join treatment to baseline and keep strata passing the count and cap gates
///
/// Output is ordered by (task id, stratum) so runs are reproducible.
pub fn combine_effects(
    treatment: &TreatmentTable<'_>,
    baseline: &BaselineTable,
    thresholds: &SampleThresholds,
    max_abs_uplift: f64,
) -> Vec<EffectRecord> {
    let min_joined = thresholds.min_joined as u64;
    let mut unmatched = 0usize;
    let mut undersized = 0usize;
    let mut capped = 0usize;

    let mut effects = Vec::new();
    for (&(task_id, stratum), treated) in treatment {
        let Some(control) = baseline.get(&stratum) else {
            unmatched += 1;
            continue;
        };

        if treated.count < min_joined || control.count < min_joined {
            undersized += 1;
            continue;
        }

        let record = EffectRecord::from_stats(task_id, stratum, treated, control);
        if !(record.uplift.abs() <= max_abs_uplift) {
            capped += 1;
            continue;
        }

        effects.push(record);
    }

    effects.sort_by(|a, b| {
        a.task_id
            .cmp(&b.task_id)
            .then_with(|| a.stratum().cmp(&b.stratum()))
    });

    tracing::debug!(
        kept = effects.len(),
        unmatched,
        undersized,
        capped,
        "Stratum effects combined"
    );

    effects
}
