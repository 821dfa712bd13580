// End-to-end tests for the ratinglift binary
//
// Simulate a panel, estimate on it and check the artifacts on disk.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str =
    "handle,time,id_of_submission_task,verdict,rating_at_submission,roll_acc_20,roll_ok_diff_20";

/// Coarse strata and exploratory gates, tuned for the default simulation
const DEMO_CONFIG: &str = r#"
forward_horizon = 10
placebo_horizon = 10
significance_level = 0.05

[buckets]
rating = 400.0

[thresholds]
min_baseline = 20
min_treatment_pilot = 5
min_joined = 20

[placebo_thresholds]
min_baseline = 10
min_treatment_pilot = 10
min_joined = 10
"#;

fn ratinglift() -> Command {
    Command::cargo_bin("ratinglift").unwrap()
}

fn simulate(dir: &Path, file: &str, users: usize) -> std::path::PathBuf {
    let panel = dir.join(file);
    ratinglift()
        .arg("simulate")
        .arg("-o")
        .arg(&panel)
        .arg("--users")
        .arg(users.to_string())
        .assert()
        .success()
        .stderr(predicate::str::contains("wrote"));
    panel
}

// ============================================================================
// Simulate
// ============================================================================

#[test]
fn test_simulate_writes_panel_with_contract_header() {
    let dir = TempDir::new().unwrap();
    let panel = simulate(dir.path(), "panel.csv", 20);

    let contents = fs::read_to_string(panel).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(HEADER));
    assert_eq!(lines.count(), 20 * 60);
}

#[test]
fn test_simulate_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let a = simulate(dir.path(), "a.csv", 10);
    let b = simulate(dir.path(), "b.csv", 10);
    assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
}

#[test]
fn test_simulate_jsonl() {
    let dir = TempDir::new().unwrap();
    let panel = simulate(dir.path(), "panel.jsonl", 5);

    let contents = fs::read_to_string(panel).unwrap();
    let first: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert!(first.get("rating_at_submission").is_some());
    assert!(first.get("handle").is_some());
}

// ============================================================================
// Estimate
// ============================================================================

#[test]
fn test_estimate_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let panel = simulate(dir.path(), "panel.csv", 600);
    let config = dir.path().join("demo.toml");
    fs::write(&config, DEMO_CONFIG).unwrap();
    let out = dir.path().join("out");

    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("--config")
        .arg(&config)
        .arg("--out-dir")
        .arg(&out)
        .arg("--format")
        .arg("both")
        .assert()
        .success()
        .stderr(predicate::str::contains("SIGNIFICANT TASKS"))
        .stderr(predicate::str::contains("Average System Bias"));

    for stem in [
        "causal_att_effects",
        "causal_att_effects_detailed",
        "placebo_selection_bias",
        "cohort_examples",
    ] {
        assert!(out.join(format!("{stem}.csv")).exists(), "{stem}.csv");
        assert!(out.join(format!("{stem}.json")).exists(), "{stem}.json");
    }

    let effects = fs::read_to_string(out.join("causal_att_effects.csv")).unwrap();
    assert!(effects.starts_with(
        "task_id,att_score,att_variance,att_probability_uplift,total_treated_samples,\
         avg_rating_level,std_err,z_score,p_value\n"
    ));
    assert!(effects.contains("BOOST-1,"));

    let bias: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("placebo_selection_bias.json")).unwrap())
            .unwrap();
    assert!(bias
        .as_array()
        .unwrap()
        .iter()
        .any(|row| row["task_id"] == "SELECT-1"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("causal_summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["counts"]["events"], 600 * 60);
    assert_eq!(summary["config"]["forward_horizon"], 10);
}

#[test]
fn test_estimate_no_placebo_skips_bias_table() {
    let dir = TempDir::new().unwrap();
    let panel = simulate(dir.path(), "panel.csv", 50);
    let out = dir.path().join("out");

    ratinglift()
        .args(["estimate", "--exploratory", "--no-placebo"])
        .arg(&panel)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Average System Bias").not());

    assert!(out.join("causal_att_effects.csv").exists());
    assert!(!out.join("placebo_selection_bias.csv").exists());
}

#[test]
fn test_estimate_empty_panel_writes_empty_tables() {
    let dir = TempDir::new().unwrap();
    let panel = dir.path().join("empty.csv");
    fs::write(&panel, format!("{HEADER}\n")).unwrap();
    let out = dir.path().join("out");

    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("-o")
        .arg(&out)
        .args(["--format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("NO SIGNIFICANT TASKS"))
        .stderr(predicate::str::contains("Average System Bias: N/A"));

    assert_eq!(
        fs::read_to_string(out.join("causal_att_effects.json")).unwrap(),
        "[]"
    );
    assert_eq!(
        fs::read_to_string(out.join("placebo_selection_bias.json")).unwrap(),
        "[]"
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_columns_named_in_error() {
    let dir = TempDir::new().unwrap();
    let panel = dir.path().join("bad.csv");
    fs::write(
        &panel,
        "handle,time,id_of_submission_task,rating_at_submission,roll_ok_diff_20\n\
         ann,1,1A,1500,1200\n",
    )
    .unwrap();

    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("-o")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required columns in panel: roll_acc_20, verdict",
        ));
}

#[test]
fn test_assume_sorted_rejects_unordered_rows() {
    let dir = TempDir::new().unwrap();
    let panel = dir.path().join("unordered.csv");
    fs::write(
        &panel,
        format!("{HEADER}\nann,2,1A,OK,1500,0.5,1200\nann,1,1B,OK,1490,0.5,1200\n"),
    )
    .unwrap();

    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("--assume-sorted")
        .arg("-o")
        .arg(dir.path().join("a"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ordering"));

    // Without the flag the loader sorts the rows itself
    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("-o")
        .arg(dir.path().join("b"))
        .assert()
        .success();
}

#[test]
fn test_invalid_config_fails_before_reading_input() {
    ratinglift()
        .args(["estimate", "/nonexistent/panel.csv", "--horizon", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("horizon must be at least 1"));
}

#[test]
fn test_invalid_rating_reports_line() {
    let dir = TempDir::new().unwrap();
    let panel = dir.path().join("bad_rating.csv");
    fs::write(&panel, format!("{HEADER}\nann,1,1A,OK,abc,0.5,1200\n")).unwrap();

    ratinglift()
        .arg("estimate")
        .arg(&panel)
        .arg("-o")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Line 2"))
        .stderr(predicate::str::contains("rating_at_submission"));
}

// ============================================================================
// Placebo
// ============================================================================

#[test]
fn test_placebo_subcommand_flags_selection_task() {
    let dir = TempDir::new().unwrap();
    let panel = simulate(dir.path(), "panel.jsonl", 600);
    let config = dir.path().join("demo.toml");
    fs::write(&config, DEMO_CONFIG).unwrap();
    let out = dir.path().join("out");

    ratinglift()
        .arg("placebo")
        .arg(&panel)
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Average System Bias"));

    let csv = fs::read_to_string(out.join("placebo_selection_bias.csv")).unwrap();
    assert!(csv.starts_with("task_id,bias_score,probability_bias_score,total_samples"));
    assert!(csv.contains("SELECT-1,"));
    assert!(!out.join("causal_att_effects.csv").exists());
}
