//! Episode outcomes and their ordering.
//!
//! Every outcome maps to a [`Score`] so that candidates can be compared
//! regardless of how their episode ended:
//!
//! - any finished lap beats any unfinished one
//! - among finished laps, a faster race time is better
//! - among unfinished laps, more distance is better, and a stuck episode pays a
//!   fixed penalty on top of its distance

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// Penalty subtracted from the distance of an episode that ended stuck.
pub const DEFAULT_STUCK_PENALTY: f64 = 1000.0;

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EpisodeResult {
    /// The lap was completed and the game reported its race time.
    Finished { race_time_ms: u64 },
    /// The lap timeout elapsed before the finish line.
    TimedOut { elapsed_ms: u64, distance_traveled: f32 },
    /// The stuck watchdog fired.
    Stuck {
        distance_traveled: f32,
        stuck_duration_ms: u64,
    },
}

impl EpisodeResult {
    /// Short outcome label used in logs.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Finished { .. } => "finished",
            Self::TimedOut { .. } => "timed_out",
            Self::Stuck { .. } => "stuck",
        }
    }
}

/// Comparable value of an episode. Greater is better.
///
/// Variant order matters: the derived ordering ranks every `Finished` score
/// above every `Unfinished` one before comparing the inner values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Distance traveled, minus the stuck penalty where applicable.
    Unfinished(f64),
    /// Negated race time in milliseconds.
    Finished(f64),
}

impl Score {
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Unfinished(v) | Self::Finished(v) => v,
        }
    }

    /// Returns `true` if `self` strictly beats `best`.
    ///
    /// Any score beats no score. Ties and incomparable values (NaN) do not.
    ///
    /// ```
    /// # use stig_training::Score;
    /// assert!(Score::Unfinished(-500.0).is_better_than(None));
    /// assert!(Score::Finished(-90_000.0).is_better_than(Some(Score::Unfinished(1e9))));
    /// assert!(!Score::Finished(-5000.0).is_better_than(Some(Score::Finished(-5000.0))));
    /// ```
    #[must_use]
    pub fn is_better_than(self, best: Option<Self>) -> bool {
        best.is_none_or(|best| self.partial_cmp(&best) == Some(Ordering::Greater))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfinished(v) => write!(f, "unfinished({v:.3})"),
            Self::Finished(v) => write!(f, "finished({v:.0})"),
        }
    }
}

/// Turns episode outcomes into scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeScorer {
    stuck_penalty: f64,
}

impl Default for EpisodeScorer {
    fn default() -> Self {
        Self::new(DEFAULT_STUCK_PENALTY)
    }
}

impl EpisodeScorer {
    #[must_use]
    pub const fn new(stuck_penalty: f64) -> Self {
        Self { stuck_penalty }
    }

    #[must_use]
    pub const fn stuck_penalty(&self) -> f64 {
        self.stuck_penalty
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn score(&self, result: &EpisodeResult) -> Score {
        match *result {
            EpisodeResult::Finished { race_time_ms } => Score::Finished(-(race_time_ms as f64)),
            EpisodeResult::TimedOut {
                distance_traveled, ..
            } => Score::Unfinished(f64::from(distance_traveled)),
            EpisodeResult::Stuck {
                distance_traveled, ..
            } => Score::Unfinished(f64::from(distance_traveled) - self.stuck_penalty),
        }
    }
}
