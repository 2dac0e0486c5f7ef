use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use stig_training::{DEFAULT_MUTATION_SCALE, EpisodeConfig, TrainerConfig};
use stig_vision::DEFAULT_MOTION_THRESHOLD;

pub(crate) const DEFAULT_FRAMES_PER_SECOND: u32 = 10;

/// Runtime settings taken from `STIG_*` environment variables.
///
/// Unset variables use the defaults. Unparsable or out-of-range values are
/// reported and replaced by the default.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub(crate) frames_per_second: u32,
    pub(crate) lap_timeout: Duration,
    pub(crate) stuck_timeout: Duration,
    pub(crate) countdown: Duration,
    pub(crate) motion_threshold: f32,
    pub(crate) mutation_scale: f32,
    pub(crate) seed: Option<u64>,
}

impl Settings {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let episode = EpisodeConfig::default();
        let secs = |name: &str, default: Duration, allow_zero: bool| {
            Duration::from_secs(read_env(&lookup, name, default.as_secs(), |v| {
                allow_zero || *v > 0
            }))
        };

        Self {
            frames_per_second: read_env(
                &lookup,
                "STIG_FRAMES_PER_SECOND",
                DEFAULT_FRAMES_PER_SECOND,
                |v| *v > 0,
            ),
            lap_timeout: secs("STIG_LAP_TIMEOUT_SECS", episode.lap_timeout, false),
            stuck_timeout: secs("STIG_STUCK_TIMEOUT_SECS", episode.stuck_timeout, false),
            countdown: secs("STIG_COUNTDOWN_SECS", episode.countdown, true),
            motion_threshold: read_env(
                &lookup,
                "STIG_MOTION_THRESHOLD",
                DEFAULT_MOTION_THRESHOLD,
                |v| v.is_finite() && *v >= 0.0,
            ),
            mutation_scale: read_env(
                &lookup,
                "STIG_MUTATION_SCALE",
                DEFAULT_MUTATION_SCALE,
                |v| v.is_finite() && *v >= 0.0,
            ),
            seed: read_env_optional(&lookup, "STIG_SEED"),
        }
    }

    pub(crate) fn episode_config(&self) -> EpisodeConfig {
        EpisodeConfig {
            tick_interval: Duration::from_secs(1) / self.frames_per_second,
            stuck_timeout: self.stuck_timeout,
            countdown: self.countdown,
            lap_timeout: self.lap_timeout,
            ..EpisodeConfig::default()
        }
    }

    pub(crate) fn trainer_config(&self, brain_path: PathBuf) -> TrainerConfig {
        TrainerConfig {
            mutation_scale: self.mutation_scale,
            brain_path,
            ..TrainerConfig::default()
        }
    }

    /// Seeded RNG if a seed is given (flag first, then `STIG_SEED`), entropy otherwise.
    pub(crate) fn rng(&self, seed: Option<u64>) -> Pcg64Mcg {
        match seed.or(self.seed) {
            Some(seed) => Pcg64Mcg::seed_from_u64(seed),
            None => Pcg64Mcg::from_rng(&mut rand::rng()),
        }
    }
}

fn read_env<T, F, V>(lookup: &F, name: &str, default: T, valid: V) -> T
where
    T: FromStr + Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!("{name}={raw:?} is invalid. Falling back to {default}.");
            default
        }
    }
}

fn read_env_optional<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    let value = raw.trim().parse::<T>().ok();
    if value.is_none() {
        tracing::warn!("{name}={raw:?} is invalid. Ignoring it.");
    }
    value
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::Rng as _;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.frames_per_second, 10);
        assert_eq!(s.lap_timeout, Duration::from_secs(120));
        assert_eq!(s.stuck_timeout, Duration::from_secs(5));
        assert_eq!(s.countdown, Duration::from_secs(3));
        assert!((s.motion_threshold - 0.01).abs() < f32::EPSILON);
        assert!((s.mutation_scale - 0.02).abs() < f32::EPSILON);
        assert_eq!(s.seed, None);
        assert_eq!(s.episode_config(), EpisodeConfig::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("STIG_FRAMES_PER_SECOND", "20"),
            ("STIG_LAP_TIMEOUT_SECS", "90"),
            ("STIG_STUCK_TIMEOUT_SECS", " 8 "),
            ("STIG_COUNTDOWN_SECS", "0"),
            ("STIG_MOTION_THRESHOLD", "0.05"),
            ("STIG_MUTATION_SCALE", "0.1"),
            ("STIG_SEED", "42"),
        ]);
        let episode = s.episode_config();
        assert_eq!(episode.tick_interval, Duration::from_millis(50));
        assert_eq!(episode.lap_timeout, Duration::from_secs(90));
        assert_eq!(episode.stuck_timeout, Duration::from_secs(8));
        assert_eq!(episode.countdown, Duration::ZERO);
        assert!((s.motion_threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(s.seed, Some(42));

        let trainer = s.trainer_config(PathBuf::from("best.bin"));
        assert!((trainer.mutation_scale - 0.1).abs() < f32::EPSILON);
        assert_eq!(trainer.brain_path, PathBuf::from("best.bin"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let s = settings(&[
            ("STIG_FRAMES_PER_SECOND", "0"),
            ("STIG_LAP_TIMEOUT_SECS", "soon"),
            ("STIG_STUCK_TIMEOUT_SECS", "0"),
            ("STIG_MOTION_THRESHOLD", "-1"),
            ("STIG_MUTATION_SCALE", "NaN"),
            ("STIG_SEED", "lucky"),
        ]);
        assert_eq!(s, settings(&[]));
    }

    #[test]
    fn test_seed_precedence() {
        let s = settings(&[("STIG_SEED", "1")]);
        let from_env = s.rng(None).random::<u64>();
        assert_eq!(from_env, Pcg64Mcg::seed_from_u64(1).random::<u64>());
        let from_flag = s.rng(Some(2)).random::<u64>();
        assert_eq!(from_flag, Pcg64Mcg::seed_from_u64(2).random::<u64>());
    }
}
