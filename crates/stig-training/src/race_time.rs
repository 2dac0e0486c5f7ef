use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// The race time shown by the game once a lap is completed.
///
/// The game renders it as `MM:SS:mmm` (minutes, seconds, milliseconds, each
/// zero-padded).
///
/// ```
/// # use stig_training::RaceTime;
/// let time: RaceTime = "01:49:214".parse().unwrap();
/// assert_eq!(time.as_millis(), 109_214);
/// assert_eq!(time.to_string(), "01:49:214");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceTime {
    millis: u64,
}

/// A race time string did not match `MM:SS:mmm`.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid race time {input:?}: {reason}")]
pub struct ParseRaceTimeError {
    input: String,
    reason: &'static str,
}

impl RaceTime {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.millis
    }

    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

impl FromStr for RaceTime {
    type Err = ParseRaceTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseRaceTimeError {
            input: s.to_owned(),
            reason,
        };

        let mut fields = s.trim().split(':');
        let (Some(minutes), Some(seconds), Some(millis), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(err("expected three fields MM:SS:mmm"));
        };

        let minutes = parse_digits(minutes, 2).ok_or_else(|| err("minutes must be two digits"))?;
        let seconds = parse_digits(seconds, 2).ok_or_else(|| err("seconds must be two digits"))?;
        let millis =
            parse_digits(millis, 3).ok_or_else(|| err("milliseconds must be three digits"))?;
        if seconds >= 60 {
            return Err(err("seconds out of range"));
        }

        Ok(Self::from_millis(minutes * 60_000 + seconds * 1_000 + millis))
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.millis / 60_000;
        let seconds = self.millis / 1_000 % 60;
        let millis = self.millis % 1_000;
        write!(f, "{minutes:02}:{seconds:02}:{millis:03}")
    }
}

fn parse_digits(field: &str, width: usize) -> Option<u64> {
    if field.len() != width || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
