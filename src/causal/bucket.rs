// Coarsened exact matching: confounders -> discrete stratum key
//
// Two events with the same key are treated as comparable. The bins are
// deliberately coarse so every stratum keeps enough events for a stable
// variance estimate at catalog scale.

use crate::config::BucketWidths;
use crate::panel::Event;
use serde::{Deserialize, Serialize};

/// One matching stratum: (rating, accuracy, difficulty) bucket ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StratumKey {
    pub rating: i32,
    pub accuracy: i32,
    pub difficulty: i32,
}

impl StratumKey {
    pub fn new(rating: i32, accuracy: i32, difficulty: i32) -> Self {
        Self {
            rating,
            accuracy,
            difficulty,
        }
    }

    /// Stratum of an event under the given bin widths
    ///
    /// Missing or non-finite accuracy/difficulty fall into bucket 0, so an
    /// event with no solved history yet is still matched on rating.
    pub fn for_event(event: &Event, widths: &BucketWidths) -> Self {
        Self {
            rating: bucket(event.rating, widths.rating),
            accuracy: bucket_or_zero(event.rolling_accuracy, widths.accuracy),
            difficulty: bucket_or_zero(event.rolling_difficulty, widths.difficulty),
        }
    }
}

impl std::fmt::Display for StratumKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.rating, self.accuracy, self.difficulty)
    }
}

/// `round(x / width)` as an integer bucket id (half away from zero)
///
/// Non-finite input maps to bucket 0. Out-of-range quotients saturate.
pub fn bucket(value: f64, width: f64) -> i32 {
    let scaled = (value / width).round();
    if scaled.is_finite() {
        scaled as i32
    } else {
        0
    }
}

fn bucket_or_zero(value: Option<f64>, width: f64) -> i32 {
    match value {
        Some(v) if v.is_finite() => bucket(v, width),
        _ => 0,
    }
}
