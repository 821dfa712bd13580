// Placebo (reverse-window) validator
//
// Runs the matching pass on the gain accumulated *before* each submission.
// A task cannot cause a rating change that already happened, so a large
// positive score means users on an upward trajectory tend to pick that task
// next: self-selection, not impact.
//
// The result is a diagnostic reported next to the forward estimates. It is
// never subtracted from them and never gates them.

use crate::causal::aggregate::mean;
use crate::causal::matching::match_panel;
use crate::causal::outcome::OutcomeWindow;
use crate::config::EstimatorConfig;
use crate::panel::Panel;
use serde::{Deserialize, Serialize};

/// Estimated selection bias for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasRecord {
    pub task_id: String,
    /// Weighted mean pre-treatment gain relative to the stratum baseline
    pub bias_score: f64,
    /// Count-weighted improvement-rate difference before treatment
    pub probability_bias_score: f64,
    pub total_samples: u64,
    /// Sampling variance of `bias_score`
    pub bias_variance: f64,
}

/// Result of the placebo pass
#[derive(Debug, Clone, Default)]
pub struct PlaceboReport {
    /// Records sorted by `bias_score` descending
    pub records: Vec<BiasRecord>,
    /// Mean bias score across tasks (`None` when there are no records)
    pub mean_bias: Option<f64>,
    /// Outcomes with a full backward window
    pub outcomes: usize,
}

impl PlaceboReport {
    /// Bias record for a task, if the task survived the placebo gates
    pub fn get(&self, task_id: &str) -> Option<&BiasRecord> {
        self.records.iter().find(|r| r.task_id == task_id)
    }
}

/// Run the reverse-window validator over a panel
pub fn run_placebo(panel: &Panel, config: &EstimatorConfig) -> PlaceboReport {
    let matched = match_panel(
        panel,
        OutcomeWindow::Backward(config.placebo_horizon),
        config,
        &config.placebo_thresholds,
    );

    let mut records: Vec<BiasRecord> = matched
        .estimates
        .into_iter()
        .map(|estimate| BiasRecord {
            task_id: estimate.task_id,
            bias_score: estimate.att,
            probability_bias_score: estimate.probability_uplift,
            total_samples: estimate.total_treated,
            bias_variance: estimate.variance,
        })
        .collect();

    records.sort_by(|a, b| {
        b.bias_score
            .total_cmp(&a.bias_score)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    let mean_bias = mean_bias_score(&records);
    match mean_bias {
        Some(mean) => tracing::info!(
            tasks = records.len(),
            mean_bias = mean,
            "Placebo selection-bias scores computed"
        ),
        None => tracing::info!("Placebo run produced no bias records"),
    }

    PlaceboReport {
        records,
        mean_bias,
        outcomes: matched.outcomes,
    }
}

/// Average system bias across tasks
fn mean_bias_score(records: &[BiasRecord]) -> Option<f64> {
    mean(records.iter().map(|r| r.bias_score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(task: &str, bias: f64) -> BiasRecord {
        BiasRecord {
            task_id: task.to_string(),
            bias_score: bias,
            probability_bias_score: 0.0,
            total_samples: 10,
            bias_variance: 1.0,
        }
    }

    #[test]
    fn test_mean_bias_score() {
        assert_eq!(mean_bias_score(&[]), None);
        let mean = mean_bias_score(&[record("a", 10.0), record("b", -4.0)]).unwrap();
        assert!((mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_bias_score_keeps_f64_precision() {
        // Neither score is representable in f32
        let mean =
            mean_bias_score(&[record("a", 1234.567_891_23), record("b", 1234.567_891_25)]).unwrap();
        assert!((mean - 1234.567_891_24).abs() < 1e-9);
    }

    #[test]
    fn test_empty_panel_yields_empty_report() {
        let report = run_placebo(&Panel::default(), &EstimatorConfig::default());
        assert!(report.records.is_empty());
        assert!(report.mean_bias.is_none());
        assert_eq!(report.outcomes, 0);
        assert!(report.get("anything").is_none());
    }
}
