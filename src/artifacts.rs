//! Persist estimator tables into an output directory

use crate::cli::OutputFormat;
use crate::config::EstimatorConfig;
use crate::csv_output::{to_csv, CsvRecord};
use crate::json_output::{to_json_array, JsonRunSummary};
use crate::pipeline::CausalReport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const EFFECTS: &str = "causal_att_effects";
pub const DETAILED: &str = "causal_att_effects_detailed";
pub const PLACEBO: &str = "placebo_selection_bias";
pub const COHORTS: &str = "cohort_examples";
pub const SUMMARY: &str = "causal_summary.json";

/// Writes tables in the requested formats and remembers what it wrote
pub struct ArtifactWriter<'a> {
    out_dir: &'a Path,
    format: OutputFormat,
    written: Vec<PathBuf>,
}

impl<'a> ArtifactWriter<'a> {
    /// Create the output directory if needed
    pub fn new(out_dir: &'a Path, format: OutputFormat) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;
        Ok(Self {
            out_dir,
            format,
            written: Vec::new(),
        })
    }

    fn write_file(&mut self, name: &str, contents: &str) -> Result<()> {
        let path = self.out_dir.join(name);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
        self.written.push(path);
        Ok(())
    }

    /// Write one table as `<stem>.csv` and/or `<stem>.json`
    pub fn table<R>(&mut self, stem: &str, rows: &[R]) -> Result<()>
    where
        R: CsvRecord + Serialize,
    {
        if self.format.csv() {
            self.write_file(&format!("{stem}.csv"), &to_csv(rows))?;
        }
        if self.format.json() {
            let json = to_json_array(rows).with_context(|| format!("Failed to encode {stem}"))?;
            self.write_file(&format!("{stem}.json"), &json)?;
        }
        Ok(())
    }

    pub fn summary(&mut self, report: &CausalReport, config: &EstimatorConfig) -> Result<()> {
        if self.format.json() {
            let json = JsonRunSummary::new(report, config)
                .to_json()
                .context("Failed to encode run summary")?;
            self.write_file(SUMMARY, &json)?;
        }
        Ok(())
    }

    /// Paths written so far
    pub fn finish(self) -> Vec<PathBuf> {
        self.written
    }
}

/// Write every artifact of an estimation run
pub fn write_report(
    report: &CausalReport,
    config: &EstimatorConfig,
    out_dir: &Path,
    format: OutputFormat,
    all_strata: bool,
) -> Result<Vec<PathBuf>> {
    let mut writer = ArtifactWriter::new(out_dir, format)?;

    writer.table(EFFECTS, &report.significant)?;
    let detailed: Vec<_> = report
        .detailed_effects(all_strata)
        .into_iter()
        .cloned()
        .collect();
    writer.table(DETAILED, &detailed)?;
    if let Some(bias) = &report.bias {
        writer.table(PLACEBO, &bias.records)?;
    }
    writer.table(COHORTS, &report.cohorts)?;
    writer.summary(report, config)?;

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::PlaceboReport;
    use tempfile::TempDir;

    #[test]
    fn test_empty_report_writes_headers_only() {
        let dir = TempDir::new().unwrap();
        let report = CausalReport {
            bias: Some(PlaceboReport::default()),
            ..CausalReport::default()
        };
        let written = write_report(
            &report,
            &EstimatorConfig::default(),
            dir.path(),
            OutputFormat::Both,
            false,
        )
        .unwrap();

        // four tables in two formats plus the summary
        assert_eq!(written.len(), 9);

        let csv = fs::read_to_string(dir.path().join("placebo_selection_bias.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("task_id,bias_score,probability_bias_score,total_samples"));

        let json = fs::read_to_string(dir.path().join("causal_att_effects.json")).unwrap();
        assert_eq!(json, "[]");
        assert!(dir.path().join(SUMMARY).exists());
    }

    #[test]
    fn test_csv_only_and_no_placebo() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/out");
        let written = write_report(
            &CausalReport::default(),
            &EstimatorConfig::default(),
            &out,
            OutputFormat::Csv,
            true,
        )
        .unwrap();

        assert_eq!(written.len(), 3);
        assert!(out.join("causal_att_effects.csv").exists());
        assert!(out.join("causal_att_effects_detailed.csv").exists());
        assert!(out.join("cohort_examples.csv").exists());
        assert!(!out.join("placebo_selection_bias.csv").exists());
        assert!(!out.join(SUMMARY).exists());
    }
}
