// ATT aggregation: stratum effects -> one estimate per task
//
// Weights are sample-proportional (w_i = n_i / n), not inverse-variance:
//   ATT      = Σ w_i · uplift_i
//   Var(ATT) = Σ w_i² · bucket_variance_i   (strata are disjoint samples)
//   P-uplift = Σ probability_uplift_i · n_i / n
// A task with no surviving strata produces no estimate at all.

use crate::causal::effect::EffectRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated effect for one task before significance testing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttEstimate {
    pub task_id: String,
    /// Weighted mean uplift in rating points
    pub att: f64,
    /// Sampling variance of `att`
    pub variance: f64,
    /// Count-weighted improvement-probability uplift
    pub probability_uplift: f64,
    /// Treated outcomes across the surviving strata
    pub total_treated: u64,
    /// Unweighted mean rating bucket of the surviving strata
    pub avg_rating_level: f64,
    /// Number of surviving strata
    pub strata: usize,
}

/// Sample-proportional weights for a task's strata (sum to 1)
pub fn stratum_weights(records: &[&EffectRecord]) -> Vec<f64> {
    let total: u64 = records.iter().map(|r| r.treated_count).sum();
    if total == 0 {
        return vec![0.0; records.len()];
    }
    records
        .iter()
        .map(|r| r.treated_count as f64 / total as f64)
        .collect()
}

/// Aggregate one task's strata; `None` when there are no usable strata
pub fn aggregate_task(task_id: &str, records: &[&EffectRecord]) -> Option<AttEstimate> {
    let total_treated: u64 = records.iter().map(|r| r.treated_count).sum();
    if records.is_empty() || total_treated == 0 {
        return None;
    }

    let weights = stratum_weights(records);
    let n = total_treated as f64;

    let mut att = 0.0;
    let mut variance = 0.0;
    let mut probability_uplift = 0.0;
    let mut rating_sum = 0.0;
    for (record, weight) in records.iter().zip(&weights) {
        att += weight * record.uplift;
        variance += weight * weight * record.bucket_variance;
        probability_uplift += record.probability_uplift * record.treated_count as f64;
        rating_sum += record.rating_bucket as f64;
    }

    Some(AttEstimate {
        task_id: task_id.to_string(),
        att,
        variance,
        probability_uplift: probability_uplift / n,
        total_treated,
        avg_rating_level: rating_sum / records.len() as f64,
        strata: records.len(),
    })
}

/// Aggregate all stratum effects into per-task estimates, ordered by task id
pub fn aggregate_att(effects: &[EffectRecord]) -> Vec<AttEstimate> {
    let mut by_task: BTreeMap<&str, Vec<&EffectRecord>> = BTreeMap::new();
    for record in effects {
        by_task.entry(record.task_id.as_str()).or_default().push(record);
    }

    let estimates: Vec<AttEstimate> = by_task
        .into_iter()
        .filter_map(|(task_id, records)| aggregate_task(task_id, &records))
        .collect();

    tracing::debug!(
        strata = effects.len(),
        tasks = estimates.len(),
        "ATT aggregated"
    );

    estimates
}
