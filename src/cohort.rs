//! Cohort examples: concrete success stories behind significant tasks
//!
//! For each significant task, the treated submissions whose forward rating
//! gain was positive, best gains first. Downstream consumers show these as
//! "users like you who solved this".

use crate::causal::{Outcome, OutcomeWindow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One treated submission followed by a rating gain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortExample {
    pub user_id: String,
    pub task_id: String,
    pub rating_before: f64,
    pub rating_after: f64,
    pub rating_gain: f64,
}

/// Pick up to `per_task` best examples for each task in `task_ids`
///
/// With `verdict` set, only submissions carrying that verdict qualify, the
/// same rule the treatment aggregation applies. Output is grouped by task id;
/// within a task, gains descend and ties are broken by user id.
pub fn extract_cohorts(
    outcomes: &[Outcome<'_>],
    window: OutcomeWindow,
    task_ids: &[&str],
    verdict: Option<&str>,
    per_task: usize,
) -> Vec<CohortExample> {
    if per_task == 0 || task_ids.is_empty() {
        return Vec::new();
    }

    let wanted: HashSet<&str> = task_ids.iter().copied().collect();
    let mut by_task: BTreeMap<&str, Vec<&Outcome<'_>>> = BTreeMap::new();
    for outcome in outcomes {
        if let Some(required) = verdict {
            if outcome.event.verdict != required {
                continue;
            }
        }
        let task = outcome.event.task_id.as_str();
        if outcome.gain > 0.0 && wanted.contains(task) {
            by_task.entry(task).or_default().push(outcome);
        }
    }

    let mut examples = Vec::new();
    for (task, mut candidates) in by_task {
        candidates.sort_by(|a, b| {
            b.gain
                .total_cmp(&a.gain)
                .then_with(|| a.event.user_id.cmp(&b.event.user_id))
        });
        examples.extend(candidates.into_iter().take(per_task).map(|o| CohortExample {
            user_id: o.event.user_id.clone(),
            task_id: task.to_string(),
            rating_before: o.rating_before(window),
            rating_after: o.rating_after(window),
            rating_gain: o.gain,
        }));
    }

    examples
}
