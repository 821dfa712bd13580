//! Human-readable run summary (printed to stderr by the binary)

use crate::config::EstimatorConfig;
use crate::pipeline::CausalReport;

/// Rows shown per table before eliding
const TOP_ROWS: usize = 10;

/// Render the summary of one run
pub fn to_report_string(report: &CausalReport, config: &EstimatorConfig) -> String {
    let mut out = String::new();
    let stats = &report.stats;

    out.push_str(&format!(
        "Panel: {} events from {} users, {} outcomes (horizon {})\n",
        stats.events, stats.users, stats.outcomes, config.forward_horizon
    ));
    out.push_str(&format!(
        "Matched strata: {} baseline, {} treatment groups, {} stratum effects\n\n",
        stats.baseline_strata, stats.treatment_groups, stats.stratum_effects
    ));

    if report.significant.is_empty() {
        out.push_str("⚠️  NO SIGNIFICANT TASKS\n\n");
    } else {
        out.push_str(&format!(
            "✅ {} SIGNIFICANT TASKS (of {} tested)\n\n",
            report.significant.len(),
            report.tested
        ));
    }
    out.push_str(&format!(
        "Significance level: {} ({}% confidence)\n",
        config.significance_level,
        (1.0 - config.significance_level) * 100.0
    ));
    if report.degenerate > 0 {
        out.push_str(&format!(
            "Excluded (degenerate variance): {}\n",
            report.degenerate
        ));
    }

    if !report.significant.is_empty() {
        out.push_str("\n📈 Top tasks by ATT:\n");
        for effect in report.significant.iter().take(TOP_ROWS) {
            out.push_str(&format!(
                "  - {}: ATT {:+.2} ± {:.2} (z = {:.2}, p = {:.2e}, n = {})\n",
                effect.task_id,
                effect.att_score,
                effect.std_err,
                effect.z_score,
                effect.p_value,
                effect.total_treated_samples
            ));
        }
        if report.significant.len() > TOP_ROWS {
            out.push_str(&format!(
                "  ... and {} more\n",
                report.significant.len() - TOP_ROWS
            ));
        }
    }

    if let Some(bias) = &report.bias {
        out.push_str(&format!(
            "\n🔍 Placebo check (backward horizon {}): {} tasks\n",
            config.placebo_horizon,
            bias.records.len()
        ));
        match bias.mean_bias {
            Some(mean) => out.push_str(&format!("Average System Bias: {:.2}\n", mean)),
            None => out.push_str("Average System Bias: N/A\n"),
        }
        for record in bias.records.iter().take(TOP_ROWS) {
            out.push_str(&format!(
                "  - {}: bias {:+.2} (n = {})\n",
                record.task_id, record.bias_score, record.total_samples
            ));
        }
    }

    out
}
