// Outcome derivation over per-user submission windows
//
// Forward outcome: rating H submissions later minus the current rating.
// Backward (placebo) outcome: current rating minus the rating H submissions
// earlier. Events without the partner submission are dropped; the truncation
// at the end of each history is an accepted bias that the placebo run audits.

use crate::panel::{Event, Panel};

/// Which side of the treatment the outcome window lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeWindow {
    /// Gain over the next `n` submissions (causal estimate)
    Forward(usize),
    /// Gain over the previous `n` submissions (selection-bias estimate)
    Backward(usize),
}

impl OutcomeWindow {
    pub fn horizon(&self) -> usize {
        match self {
            Self::Forward(h) | Self::Backward(h) => *h,
        }
    }
}

/// An event paired with its derived outcome
#[derive(Debug, Clone, Copy)]
pub struct Outcome<'a> {
    pub event: &'a Event,
    /// Rating at the other end of the window
    pub partner_rating: f64,
    /// Rating change across the window
    pub gain: f64,
    /// `gain > 0`
    pub improved: bool,
}

impl<'a> Outcome<'a> {
    /// Rating before the window (event rating for forward outcomes)
    pub fn rating_before(&self, window: OutcomeWindow) -> f64 {
        match window {
            OutcomeWindow::Forward(_) => self.event.rating,
            OutcomeWindow::Backward(_) => self.partner_rating,
        }
    }

    /// Rating after the window
    pub fn rating_after(&self, window: OutcomeWindow) -> f64 {
        match window {
            OutcomeWindow::Forward(_) => self.partner_rating,
            OutcomeWindow::Backward(_) => self.event.rating,
        }
    }
}

/// Derive outcomes for every event that has a partner inside its history
pub fn derive_outcomes(panel: &Panel, window: OutcomeWindow) -> Vec<Outcome<'_>> {
    let horizon = window.horizon();
    let mut outcomes = Vec::with_capacity(panel.len());

    for history in panel.histories() {
        if history.len() <= horizon {
            continue;
        }

        match window {
            OutcomeWindow::Forward(_) => {
                for (event, later) in history.iter().zip(&history[horizon..]) {
                    outcomes.push(make_outcome(event, later.rating, later.rating - event.rating));
                }
            }
            OutcomeWindow::Backward(_) => {
                for (earlier, event) in history.iter().zip(&history[horizon..]) {
                    outcomes.push(make_outcome(
                        event,
                        earlier.rating,
                        event.rating - earlier.rating,
                    ));
                }
            }
        }
    }

    tracing::debug!(
        ?window,
        events = panel.len(),
        outcomes = outcomes.len(),
        "Derived outcomes"
    );

    outcomes
}

fn make_outcome(event: &Event, partner_rating: f64, gain: f64) -> Outcome<'_> {
    Outcome {
        event,
        partner_rating,
        gain,
        improved: gain > 0.0,
    }
}
