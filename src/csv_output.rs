//! CSV output format for estimator artifacts
//!
//! Every table is written with a header row, even when it has no rows, so
//! downstream readers always see the schema.

use crate::causal::{BiasRecord, EffectRecord, ProblemEffect};
use crate::cohort::CohortExample;
use crate::panel::{ColumnNames, Event};

/// A row type that can be written as one CSV record
pub trait CsvRecord {
    /// Column names in output order
    const HEADER: &'static [&'static str];

    /// Formatted fields, one per header column
    fn fields(&self) -> Vec<String>;
}

/// Escape CSV field (handle commas, quotes, line breaks)
pub fn escape_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render a table as CSV
pub fn to_csv<'a, R, I>(rows: I) -> String
where
    R: CsvRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut output = String::new();
    output.push_str(&R::HEADER.join(","));
    output.push('\n');

    for row in rows {
        output.push_str(&row.fields().join(","));
        output.push('\n');
    }

    output
}

impl CsvRecord for ProblemEffect {
    const HEADER: &'static [&'static str] = &[
        "task_id",
        "att_score",
        "att_variance",
        "att_probability_uplift",
        "total_treated_samples",
        "avg_rating_level",
        "std_err",
        "z_score",
        "p_value",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            escape_field(&self.task_id),
            self.att_score.to_string(),
            self.att_variance.to_string(),
            self.att_probability_uplift.to_string(),
            self.total_treated_samples.to_string(),
            self.avg_rating_level.to_string(),
            self.std_err.to_string(),
            self.z_score.to_string(),
            self.p_value.to_string(),
        ]
    }
}

impl CsvRecord for EffectRecord {
    const HEADER: &'static [&'static str] = &[
        "task_id",
        "rating_bucket",
        "accuracy_bucket",
        "difficulty_bucket",
        "treated_gain",
        "treated_std",
        "treated_count",
        "treated_improve_prob",
        "baseline_gain",
        "baseline_std",
        "baseline_count",
        "baseline_improve_prob",
        "uplift",
        "bucket_variance",
        "probability_uplift",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            escape_field(&self.task_id),
            self.rating_bucket.to_string(),
            self.accuracy_bucket.to_string(),
            self.difficulty_bucket.to_string(),
            self.treated_gain.to_string(),
            self.treated_std.to_string(),
            self.treated_count.to_string(),
            self.treated_improve_prob.to_string(),
            self.baseline_gain.to_string(),
            self.baseline_std.to_string(),
            self.baseline_count.to_string(),
            self.baseline_improve_prob.to_string(),
            self.uplift.to_string(),
            self.bucket_variance.to_string(),
            self.probability_uplift.to_string(),
        ]
    }
}

impl CsvRecord for BiasRecord {
    const HEADER: &'static [&'static str] = &[
        "task_id",
        "bias_score",
        "probability_bias_score",
        "total_samples",
        "bias_variance",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            escape_field(&self.task_id),
            self.bias_score.to_string(),
            self.probability_bias_score.to_string(),
            self.total_samples.to_string(),
            self.bias_variance.to_string(),
        ]
    }
}

impl CsvRecord for CohortExample {
    const HEADER: &'static [&'static str] = &[
        "user_id",
        "task_id",
        "rating_before",
        "rating_after",
        "rating_gain",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            escape_field(&self.user_id),
            escape_field(&self.task_id),
            self.rating_before.to_string(),
            self.rating_after.to_string(),
            self.rating_gain.to_string(),
        ]
    }
}

/// Render submission events under the given column names
///
/// The output is readable by `panel::read_csv` with the same `ColumnNames`.
pub fn panel_to_csv(events: &[Event], columns: &ColumnNames) -> String {
    let mut output = columns
        .required()
        .iter()
        .map(|name| escape_field(name))
        .collect::<Vec<_>>()
        .join(",");
    output.push('\n');

    for event in events {
        let fields = [
            escape_field(&event.user_id),
            event.timestamp.to_string(),
            escape_field(&event.task_id),
            escape_field(&event.verdict),
            event.rating.to_string(),
            optional(event.rolling_accuracy),
            optional(event.rolling_difficulty),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}
