//! JSON output format for estimator artifacts
//!
//! Tables are plain JSON arrays (`[]` when empty). The run summary is a
//! single versioned document next to them.

use crate::config::EstimatorConfig;
use crate::panel::{ColumnNames, Event};
use crate::pipeline::CausalReport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Row counts of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunCounts {
    pub events: usize,
    pub users: usize,
    pub outcomes: usize,
    pub stratum_effects: usize,
    pub tasks_estimated: usize,
    pub tasks_tested: usize,
    pub tasks_degenerate: usize,
    pub tasks_significant: usize,
    pub cohort_examples: usize,
}

/// Placebo section of the summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPlaceboSummary {
    pub horizon: usize,
    pub tasks: usize,
    /// Average system bias (absent when no task survived the placebo gates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_bias: Option<f64>,
}

/// Run summary document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunSummary {
    pub version: String,
    pub format: String,
    pub config: EstimatorConfig,
    pub counts: JsonRunCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_att: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placebo: Option<JsonPlaceboSummary>,
}

impl JsonRunSummary {
    pub fn new(report: &CausalReport, config: &EstimatorConfig) -> Self {
        let placebo = report.bias.as_ref().map(|bias| JsonPlaceboSummary {
            horizon: config.placebo_horizon,
            tasks: bias.records.len(),
            mean_bias: bias.mean_bias,
        });

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "ratinglift-json-v1".to_string(),
            config: config.clone(),
            counts: JsonRunCounts {
                events: report.stats.events,
                users: report.stats.users,
                outcomes: report.stats.outcomes,
                stratum_effects: report.stats.stratum_effects,
                tasks_estimated: report.stats.tasks_estimated,
                tasks_tested: report.tested,
                tasks_degenerate: report.degenerate,
                tasks_significant: report.significant.len(),
                cohort_examples: report.cohorts.len(),
            },
            mean_att: report.mean_att(),
            placebo,
        }
    }

    /// Serialize to pretty JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Render a table as a pretty JSON array
pub fn to_json_array<T: Serialize>(rows: &[T]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}

/// Render submission events as JSON Lines under the given column names
pub fn panel_to_jsonl(events: &[Event], columns: &ColumnNames) -> serde_json::Result<String> {
    let mut output = String::new();
    for event in events {
        let mut row = Map::new();
        row.insert(columns.user_id.clone(), Value::from(event.user_id.as_str()));
        row.insert(columns.timestamp.clone(), Value::from(event.timestamp));
        row.insert(columns.task_id.clone(), Value::from(event.task_id.as_str()));
        row.insert(columns.verdict.clone(), Value::from(event.verdict.as_str()));
        row.insert(columns.rating.clone(), Value::from(event.rating));
        row.insert(
            columns.rolling_accuracy.clone(),
            Value::from(event.rolling_accuracy),
        );
        row.insert(
            columns.rolling_difficulty.clone(),
            Value::from(event.rolling_difficulty),
        );
        output.push_str(&serde_json::to_string(&row)?);
        output.push('\n');
    }
    Ok(output)
}
