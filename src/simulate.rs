//! Synthetic submission panels
//!
//! Users follow a random walk in rating. Two kinds of planted tasks give the
//! estimator something to find:
//!
//! - boost tasks: completing one adds a fixed rating jump right after it
//! - selection tasks: no effect at all, but users only attempt them at the
//!   end of a rising streak (what the placebo check should flag)
//!
//! Everything is driven by one seeded `StdRng`, so a config always yields the
//! same panel.

use crate::panel::{Event, Panel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// First timestamp handed out (seconds)
const EPOCH: i64 = 1_600_000_000;

/// Generator parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub users: usize,
    pub submissions_per_user: usize,
    /// Number of effect-free filler tasks
    pub filler_tasks: usize,
    pub boost_tasks: Vec<String>,
    /// Rating jump after a boost task
    pub boost_gain: f64,
    /// Share of users who attempt a boost task
    pub boost_share: f64,
    pub selection_tasks: Vec<String>,
    /// Share of users who attempt a selection task
    pub selection_share: f64,
    /// Submissions in the streak before a selection task
    pub streak_len: usize,
    /// Extra rating per submission during the streak
    pub streak_gain: f64,
    /// Half-width of the uniform random-walk step
    pub step: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            users: 600,
            submissions_per_user: 60,
            filler_tasks: 20,
            boost_tasks: vec!["BOOST-1".to_string()],
            boost_gain: 60.0,
            boost_share: 0.6,
            selection_tasks: vec!["SELECT-1".to_string()],
            selection_share: 0.6,
            streak_len: 10,
            streak_gain: 8.0,
            step: 15.0,
        }
    }
}

/// Uniform index in `lo..hi`, or `None` when the range is empty
fn pick(rng: &mut StdRng, lo: usize, hi: usize) -> Option<usize> {
    (lo < hi).then(|| rng.gen_range(lo..hi))
}

fn pick_task<'a>(rng: &mut StdRng, tasks: &'a [String]) -> Option<&'a str> {
    (!tasks.is_empty()).then(|| tasks[rng.gen_range(0..tasks.len())].as_str())
}

/// Generate the raw submission events
///
/// Boost tasks land in the first half of a history and selection tasks in
/// the second half, so their windows do not overlap.
pub fn simulate_events(config: &SimulationConfig) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.submissions_per_user;
    let half = n / 2;
    let mut events = Vec::with_capacity(config.users * n);

    for u in 0..config.users {
        let user_id = format!("sim_user_{:05}", u);

        // Two skill tiers keep the accuracy / difficulty buckets coarse
        let (accuracy, difficulty) = if rng.gen_bool(0.5) {
            (0.42, 800.0)
        } else {
            (0.62, 1200.0)
        };
        let mut rating: f64 = rng.gen_range(1200.0..1800.0);

        let boost = if rng.gen_bool(config.boost_share) {
            pick_task(&mut rng, &config.boost_tasks)
                .zip(pick(&mut rng, 5, half.saturating_sub(5)))
        } else {
            None
        };
        let selection = if rng.gen_bool(config.selection_share) {
            pick_task(&mut rng, &config.selection_tasks).zip(pick(
                &mut rng,
                (half + config.streak_len).max(config.streak_len),
                n.saturating_sub(12),
            ))
        } else {
            None
        };

        for i in 0..n {
            let task_id = match (boost, selection) {
                (Some((task, at)), _) if at == i => task.to_string(),
                (_, Some((task, at))) if at == i => task.to_string(),
                _ if config.filler_tasks == 0 => "FILL-000".to_string(),
                _ => format!("FILL-{:03}", rng.gen_range(0..config.filler_tasks)),
            };
            let verdict = if rng.gen_bool(0.7) { "OK" } else { "WRONG_ANSWER" };

            events.push(Event {
                user_id: user_id.clone(),
                timestamp: EPOCH + (u as i64) * 60 + (i as i64) * 3_600,
                task_id,
                verdict: verdict.to_string(),
                rating,
                rolling_accuracy: Some(accuracy + rng.gen_range(-0.04..0.04)),
                rolling_difficulty: Some(difficulty + rng.gen_range(-90.0..90.0)),
            });

            let mut delta = if config.step > 0.0 {
                rng.gen_range(-config.step..config.step)
            } else {
                0.0
            };
            if let Some((_, at)) = boost {
                if at == i {
                    delta += config.boost_gain;
                }
            }
            if let Some((_, at)) = selection {
                if i < at && i + config.streak_len >= at {
                    delta += config.streak_gain;
                }
            }
            rating += delta;
        }
    }

    tracing::debug!(
        users = config.users,
        events = events.len(),
        seed = config.seed,
        "Simulated panel"
    );
    events
}

/// Generate a panel ready for the estimator
pub fn simulate_panel(config: &SimulationConfig) -> Panel {
    Panel::from_events(simulate_events(config))
}
