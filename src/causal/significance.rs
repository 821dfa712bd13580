// Significance testing of per-task ATT estimates
//
// z = ATT / sqrt(Var(ATT)), p = 2 · (1 − Φ(|z|)) under the normal
// approximation. Φ comes from libm's complementary error function, which
// keeps precision in the far tail: 2 · (1 − Φ(|z|)) = erfc(|z| / √2).
//
// Estimates whose standard error is zero or non-finite are excluded and
// counted as degenerate; they never surface with an infinite z-score.

use crate::causal::att::AttEstimate;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Terminal per-task effect with its test statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemEffect {
    pub task_id: String,
    pub att_score: f64,
    pub att_variance: f64,
    pub att_probability_uplift: f64,
    pub total_treated_samples: u64,
    pub avg_rating_level: f64,
    pub std_err: f64,
    pub z_score: f64,
    pub p_value: f64,
}

/// Result of testing every estimate of a run
#[derive(Debug, Clone, Default)]
pub struct SignificanceSummary {
    /// Tasks with p < significance level, sorted by ATT descending
    pub significant: Vec<ProblemEffect>,
    /// Estimates with a well-defined test statistic
    pub tested: usize,
    /// Estimates excluded for zero or non-finite standard error
    pub degenerate: usize,
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x / SQRT_2)
}

/// Two-tailed p-value of a z statistic
pub fn two_tailed_p_value(z: f64) -> f64 {
    libm::erfc(z.abs() / SQRT_2).clamp(0.0, 1.0)
}

/// Compute the test statistics of one estimate
///
/// Returns `None` for a degenerate standard error.
pub fn test_estimate(estimate: &AttEstimate) -> Option<ProblemEffect> {
    let std_err = estimate.variance.sqrt();
    if !(std_err.is_finite() && std_err > 0.0) || !estimate.att.is_finite() {
        return None;
    }

    let z_score = estimate.att / std_err;
    Some(ProblemEffect {
        task_id: estimate.task_id.clone(),
        att_score: estimate.att,
        att_variance: estimate.variance,
        att_probability_uplift: estimate.probability_uplift,
        total_treated_samples: estimate.total_treated,
        avg_rating_level: estimate.avg_rating_level,
        std_err,
        z_score,
        p_value: two_tailed_p_value(z_score),
    })
}

/// Test all estimates and keep those with `p < significance_level`
pub fn select_significant(estimates: &[AttEstimate], significance_level: f64) -> SignificanceSummary {
    let mut summary = SignificanceSummary::default();

    for estimate in estimates {
        match test_estimate(estimate) {
            Some(effect) => {
                summary.tested += 1;
                if effect.p_value < significance_level {
                    summary.significant.push(effect);
                }
            }
            None => {
                summary.degenerate += 1;
                tracing::debug!(
                    task = %estimate.task_id,
                    variance = estimate.variance,
                    "Skipping degenerate standard error"
                );
            }
        }
    }

    summary.significant.sort_by(|a, b| {
        b.att_score
            .total_cmp(&a.att_score)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    tracing::info!(
        tested = summary.tested,
        degenerate = summary.degenerate,
        significant = summary.significant.len(),
        significance_level,
        "Significance filter applied"
    );

    summary
}
