//! ratinglift - causal impact of practice tasks on rating trajectories
//!
//! Estimates, for every task in a longitudinal submission panel, the average
//! treatment effect on the treated (ATT) of attempting it on a user's rating
//! a fixed number of submissions later. Users are matched on coarsened
//! confounders (rating, rolling accuracy, rolling difficulty); a reverse
//! window placebo check flags tasks that users pick while already improving.

pub mod artifacts;
pub mod causal;
pub mod cli;
pub mod cohort;
pub mod config;
pub mod csv_output;
pub mod json_output;
pub mod panel;
pub mod pipeline;
pub mod report;
pub mod simulate;
