//! Running a single lap with a candidate network.
//!
//! An episode walks through these phases:
//!
//! ```text
//! Idle → Reset → Countdown → Running → { Finished | TimedOut | Stuck } → Idle
//! ```
//!
//! While running, three activities race each other:
//!
//! - the **control loop** captures a frame every tick, feeds it to the motion
//!   detector, then asks the network for an action and applies it
//! - the **stuck watchdog** ends the episode once no motion has been seen for
//!   longer than the stuck timeout
//! - the **finish watcher** waits for the game to report the finish line, bounded
//!   by the lap timeout
//!
//! Whichever of the watchers resolves first decides the outcome; the control
//! loop never ends on its own. Per-tick failures (capture, decode, key input)
//! are logged and the tick is skipped.

use std::{
    convert::Infallible,
    future,
    time::{Duration, Instant},
};

use stig_brain::{Action, PolicyNetwork, PredictionError};
use stig_vision::{MotionDetector, MotionStats};
use tokio::time::{self, MissedTickBehavior};

use crate::{
    host::{ActionSink, ApplyError, CaptureError, EpisodeHost, FrameSource, HostError},
    race_time::{ParseRaceTimeError, RaceTime},
    score::EpisodeResult,
};

/// Timing knobs of an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeConfig {
    /// Period of the control loop.
    pub tick_interval: Duration,
    /// Period of the stuck watchdog.
    pub watchdog_interval: Duration,
    /// Episode ends as stuck after this long without motion.
    pub stuck_timeout: Duration,
    /// Wait between reset and driving, matching the game's start countdown.
    pub countdown: Duration,
    /// Episode ends as timed out after this long.
    pub lap_timeout: Duration,
    /// Feed frames to the motion detector and run the stuck watchdog.
    pub track_motion: bool,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            watchdog_interval: Duration::from_millis(500),
            stuck_timeout: Duration::from_secs(5),
            countdown: Duration::from_secs(3),
            lap_timeout: Duration::from_secs(120),
            track_motion: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EpisodePhase {
    #[display("idle")]
    Idle,
    #[display("reset")]
    Reset,
    #[display("countdown")]
    Countdown,
    #[display("running")]
    Running,
    #[display("finished")]
    Finished,
    #[display("timed_out")]
    TimedOut,
    #[display("stuck")]
    Stuck,
}

/// An episode could not produce a result.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EpisodeError {
    #[display("failed to reset race: {_0}")]
    Reset(HostError),
    #[display("failed while waiting for finish: {_0}")]
    Finish(HostError),
    #[display("failed to read final race time: {_0}")]
    FinalTime(HostError),
    #[display("finished with unreadable race time: {_0}")]
    RaceTime(ParseRaceTimeError),
}

impl EpisodeError {
    /// Whether training should stop because of this error.
    ///
    /// An unreadable race time only spoils the current episode; everything
    /// else means the game is no longer under control.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RaceTime(_))
    }
}

/// Something that can evaluate a network by driving one episode.
pub trait RunEpisode {
    fn run_episode(
        &mut self,
        brain: &PolicyNetwork,
    ) -> impl Future<Output = Result<EpisodeResult, EpisodeError>>;
}

#[derive(Debug, derive_more::Display)]
enum TickError {
    #[display("{_0}")]
    Capture(CaptureError),
    #[display("{_0}")]
    Predict(PredictionError),
    #[display("{_0}")]
    Apply(ApplyError),
}

enum Ending {
    Finished,
    TimedOut,
    Stuck(MotionStats),
    HostFailed(HostError),
}

/// Drives episodes against the game through its collaborators.
///
/// The motion detector is owned for the runner's lifetime and reset at the
/// start of every episode.
#[derive(Debug)]
pub struct EpisodeRunner<F, S, H> {
    frames: F,
    sink: S,
    host: H,
    detector: MotionDetector,
    config: EpisodeConfig,
    phase: EpisodePhase,
}

impl<F, S, H> EpisodeRunner<F, S, H> {
    /// # Panics
    ///
    /// Panics if the tick or watchdog interval is zero.
    pub fn new(frames: F, sink: S, host: H, detector: MotionDetector, config: EpisodeConfig) -> Self {
        assert!(!config.tick_interval.is_zero(), "tick interval must be non-zero");
        assert!(
            !config.watchdog_interval.is_zero(),
            "watchdog interval must be non-zero"
        );
        Self {
            frames,
            sink,
            host,
            detector,
            config,
            phase: EpisodePhase::Idle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    #[must_use]
    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    #[must_use]
    pub fn frames(&self) -> &F {
        &self.frames
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    fn enter(&mut self, phase: EpisodePhase) {
        tracing::debug!(from = %self.phase, to = %phase, "episode phase");
        self.phase = phase;
    }
}

impl<F, S, H> EpisodeRunner<F, S, H>
where
    F: FrameSource,
    S: ActionSink,
    H: EpisodeHost,
{
    async fn drive(&mut self, brain: &PolicyNetwork) -> Result<EpisodeResult, EpisodeError> {
        self.enter(EpisodePhase::Reset);
        self.host.reset().await.map_err(EpisodeError::Reset)?;
        self.detector.reset();

        self.enter(EpisodePhase::Countdown);
        time::sleep(self.config.countdown).await;

        self.enter(EpisodePhase::Running);
        self.detector.reset();
        let started = Instant::now();
        let ending = self.race(brain).await;
        self.release_keys().await;

        let result = match ending {
            Ending::Finished => {
                self.enter(EpisodePhase::Finished);
                let text = self
                    .host
                    .final_time()
                    .await
                    .map_err(EpisodeError::FinalTime)?;
                let race_time = text.parse::<RaceTime>().map_err(EpisodeError::RaceTime)?;
                EpisodeResult::Finished {
                    race_time_ms: race_time.as_millis(),
                }
            }
            Ending::TimedOut => {
                self.enter(EpisodePhase::TimedOut);
                EpisodeResult::TimedOut {
                    elapsed_ms: as_millis(started.elapsed()),
                    distance_traveled: self.detector.total_distance(),
                }
            }
            Ending::Stuck(stats) => {
                self.enter(EpisodePhase::Stuck);
                EpisodeResult::Stuck {
                    distance_traveled: stats.total_distance,
                    stuck_duration_ms: as_millis(stats.time_since_motion),
                }
            }
            Ending::HostFailed(err) => return Err(EpisodeError::Finish(err)),
        };
        tracing::info!(
            outcome = result.outcome(),
            frames = self.detector.frame_count(),
            ?result,
            "episode ended"
        );
        Ok(result)
    }

    async fn race(&mut self, brain: &PolicyNetwork) -> Ending {
        let Self {
            frames,
            sink,
            host,
            detector,
            config,
            ..
        } = self;
        let (detector, config) = (&*detector, &*config);

        tokio::select! {
            biased;
            finish = time::timeout(config.lap_timeout, host.wait_for_finish()) => match finish {
                Ok(Ok(())) => Ending::Finished,
                Ok(Err(err)) => Ending::HostFailed(err),
                Err(_elapsed) => Ending::TimedOut,
            },
            stats = watch_for_stuck(detector, config) => Ending::Stuck(stats),
            never = control_loop(brain, frames, sink, detector, config) => match never {},
        }
    }

    async fn release_keys(&mut self) {
        if let Err(err) = self.sink.apply(Action::default()).await {
            tracing::warn!(%err, "failed to release keys");
        }
    }
}

impl<F, S, H> RunEpisode for EpisodeRunner<F, S, H>
where
    F: FrameSource,
    S: ActionSink,
    H: EpisodeHost,
{
    async fn run_episode(&mut self, brain: &PolicyNetwork) -> Result<EpisodeResult, EpisodeError> {
        let result = self.drive(brain).await;
        self.enter(EpisodePhase::Idle);
        result
    }
}

async fn control_loop<F, S>(
    brain: &PolicyNetwork,
    frames: &mut F,
    sink: &mut S,
    detector: &MotionDetector,
    config: &EpisodeConfig,
) -> Infallible
where
    F: FrameSource,
    S: ActionSink,
{
    let mut ticker = time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick = 0_u64;
    loop {
        ticker.tick().await;
        tick += 1;
        match control_tick(brain, frames, sink, detector, config).await {
            Ok(action) => tracing::debug!(tick, %action, "control tick"),
            Err(err) => tracing::warn!(tick, %err, "skipping control tick"),
        }
    }
}

async fn control_tick<F, S>(
    brain: &PolicyNetwork,
    frames: &mut F,
    sink: &mut S,
    detector: &MotionDetector,
    config: &EpisodeConfig,
) -> Result<Action, TickError>
where
    F: FrameSource,
    S: ActionSink,
{
    let frame = frames.capture().await.map_err(TickError::Capture)?;
    if config.track_motion
        && let Err(err) = detector.process_frame(&frame)
    {
        tracing::warn!(%err, "frame ignored by motion detector");
    }
    let action = brain.predict(&frame).map_err(TickError::Predict)?;
    sink.apply(action).await.map_err(TickError::Apply)?;
    Ok(action)
}

async fn watch_for_stuck(detector: &MotionDetector, config: &EpisodeConfig) -> MotionStats {
    if !config.track_motion {
        return future::pending().await;
    }
    let mut ticker = time::interval(config.watchdog_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let stats = detector.stats();
        if stats.time_since_motion > config.stuck_timeout {
            tracing::info!(
                since_motion = ?stats.time_since_motion,
                distance = stats.total_distance,
                "no motion detected, car is stuck"
            );
            return stats;
        }
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    fn png(value: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(16, 16, Rgb([value; 3]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn brain() -> PolicyNetwork {
        PolicyNetwork::random(256, 4, &mut Pcg64Mcg::seed_from_u64(1))
    }

    struct ScriptedFrames {
        frames: Vec<Vec<u8>>,
        next: usize,
        captures: usize,
        fail_every: Option<usize>,
    }

    impl ScriptedFrames {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                frames,
                next: 0,
                captures: 0,
                fail_every: None,
            }
        }

        fn moving() -> Self {
            Self::new(vec![png(0), png(255)])
        }

        fn still() -> Self {
            Self::new(vec![png(90)])
        }
    }

    impl FrameSource for ScriptedFrames {
        async fn capture(&mut self) -> Result<Vec<u8>, CaptureError> {
            self.captures += 1;
            if self.fail_every.is_some_and(|n| self.captures % n == 0) {
                return Err(CaptureError::new("screenshot timed out"));
            }
            let frame = self.frames[self.next % self.frames.len()].clone();
            self.next += 1;
            Ok(frame)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        actions: Vec<Action>,
        failures: usize,
        fail: bool,
    }

    impl ActionSink for RecordingSink {
        async fn apply(&mut self, action: Action) -> Result<(), ApplyError> {
            if self.fail {
                self.failures += 1;
                return Err(ApplyError::new("key injection failed"));
            }
            self.actions.push(action);
            Ok(())
        }
    }

    struct FakeHost {
        finish_after: Option<Duration>,
        final_time: String,
        resets: usize,
        fail_reset: bool,
    }

    impl FakeHost {
        fn finishing(after: Duration, final_time: &str) -> Self {
            Self {
                finish_after: Some(after),
                final_time: final_time.to_owned(),
                resets: 0,
                fail_reset: false,
            }
        }

        fn never_finishing() -> Self {
            Self {
                finish_after: None,
                final_time: String::new(),
                resets: 0,
                fail_reset: false,
            }
        }
    }

    impl EpisodeHost for FakeHost {
        async fn reset(&mut self) -> Result<(), HostError> {
            if self.fail_reset {
                return Err(HostError::new("page not loaded"));
            }
            self.resets += 1;
            Ok(())
        }

        async fn wait_for_finish(&mut self) -> Result<(), HostError> {
            match self.finish_after {
                Some(after) => {
                    time::sleep(after).await;
                    Ok(())
                }
                None => future::pending().await,
            }
        }

        async fn final_time(&mut self) -> Result<String, HostError> {
            Ok(self.final_time.clone())
        }
    }

    fn fast_config() -> EpisodeConfig {
        EpisodeConfig {
            tick_interval: Duration::from_millis(5),
            watchdog_interval: Duration::from_millis(5),
            stuck_timeout: Duration::from_secs(10),
            countdown: Duration::ZERO,
            lap_timeout: Duration::from_secs(2),
            track_motion: true,
        }
    }

    fn runner(
        frames: ScriptedFrames,
        host: FakeHost,
        config: EpisodeConfig,
    ) -> EpisodeRunner<ScriptedFrames, RecordingSink, FakeHost> {
        EpisodeRunner::new(
            frames,
            RecordingSink::default(),
            host,
            MotionDetector::default(),
            config,
        )
    }

    #[tokio::test]
    async fn test_finished_episode_reads_race_time() {
        let mut runner = runner(
            ScriptedFrames::moving(),
            FakeHost::finishing(Duration::from_millis(60), "01:49:214"),
            fast_config(),
        );
        let result = runner.run_episode(&brain()).await.unwrap();

        assert_eq!(
            result,
            EpisodeResult::Finished {
                race_time_ms: 109_214
            }
        );
        assert_eq!(runner.host().resets, 1);
        assert_eq!(runner.phase(), EpisodePhase::Idle);
        let actions = &runner.sink().actions;
        assert!(actions.len() >= 2, "{actions:?}");
        assert_eq!(actions.last(), Some(&Action::default()));
    }

    #[tokio::test]
    async fn test_timed_out_episode_reports_distance() {
        let mut config = fast_config();
        config.lap_timeout = Duration::from_millis(80);
        let mut runner = runner(ScriptedFrames::moving(), FakeHost::never_finishing(), config);

        let result = runner.run_episode(&brain()).await.unwrap();
        let EpisodeResult::TimedOut {
            elapsed_ms,
            distance_traveled,
        } = result
        else {
            panic!("expected timeout, got {result:?}");
        };
        assert!(elapsed_ms >= 80, "{elapsed_ms}");
        assert!(distance_traveled > 0.0);
        assert_eq!(runner.sink().actions.last(), Some(&Action::default()));
    }

    #[tokio::test]
    async fn test_stuck_episode_ends_early() {
        let mut config = fast_config();
        config.stuck_timeout = Duration::from_millis(40);
        config.lap_timeout = Duration::from_secs(5);
        let mut runner = runner(ScriptedFrames::still(), FakeHost::never_finishing(), config);

        let result = runner.run_episode(&brain()).await.unwrap();
        let EpisodeResult::Stuck {
            distance_traveled,
            stuck_duration_ms,
        } = result
        else {
            panic!("expected stuck, got {result:?}");
        };
        assert!(distance_traveled.abs() < f32::EPSILON);
        assert!(stuck_duration_ms >= 40, "{stuck_duration_ms}");
        assert!(runner.detector().frame_count() > 0);
    }

    #[tokio::test]
    async fn test_without_motion_tracking_only_timeout_applies() {
        let mut config = fast_config();
        config.track_motion = false;
        config.stuck_timeout = Duration::from_millis(10);
        config.lap_timeout = Duration::from_millis(100);
        let mut runner = runner(ScriptedFrames::still(), FakeHost::never_finishing(), config);

        let result = runner.run_episode(&brain()).await.unwrap();
        assert!(matches!(result, EpisodeResult::TimedOut { .. }), "{result:?}");
        assert_eq!(runner.detector().frame_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_race_time_is_not_fatal() {
        let mut runner = runner(
            ScriptedFrames::moving(),
            FakeHost::finishing(Duration::from_millis(20), "xx:yy:zzz"),
            fast_config(),
        );
        let err = runner.run_episode(&brain()).await.unwrap_err();
        assert!(matches!(err, EpisodeError::RaceTime(_)), "{err}");
        assert!(!err.is_fatal());
        assert_eq!(runner.sink().actions.last(), Some(&Action::default()));
        assert_eq!(runner.phase(), EpisodePhase::Idle);
    }

    #[tokio::test]
    async fn test_failed_ticks_are_skipped() {
        let mut frames = ScriptedFrames::moving();
        frames.fail_every = Some(2);
        let mut runner = runner(
            frames,
            FakeHost::finishing(Duration::from_millis(60), "00:05:000"),
            fast_config(),
        );

        let result = runner.run_episode(&brain()).await.unwrap();
        assert_eq!(result, EpisodeResult::Finished { race_time_ms: 5_000 });
        // one applied action per successful capture, plus the final release
        let frames = runner.frames();
        assert_eq!(runner.sink().actions.len(), frames.next + 1);
        assert!(frames.captures > frames.next);
    }

    #[tokio::test]
    async fn test_motion_is_tracked_when_keys_fail() {
        let mut config = fast_config();
        config.stuck_timeout = Duration::from_millis(60);
        config.lap_timeout = Duration::from_millis(150);
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let mut runner = EpisodeRunner::new(
            ScriptedFrames::moving(),
            sink,
            FakeHost::never_finishing(),
            MotionDetector::default(),
            config,
        );

        let result = runner.run_episode(&brain()).await.unwrap();
        let EpisodeResult::TimedOut {
            distance_traveled, ..
        } = result
        else {
            panic!("expected timeout, got {result:?}");
        };
        assert!(distance_traveled > 0.0);
        assert!(runner.sink().failures > 0);
        assert_eq!(runner.detector().frame_count(), runner.frames().next);
    }

    #[tokio::test]
    async fn test_undecodable_frames_are_skipped() {
        let frames = ScriptedFrames::new(vec![b"garbage".to_vec()]);
        let mut runner = runner(
            frames,
            FakeHost::finishing(Duration::from_millis(30), "00:05:000"),
            fast_config(),
        );

        let result = runner.run_episode(&brain()).await.unwrap();
        assert_eq!(result, EpisodeResult::Finished { race_time_ms: 5_000 });
        assert_eq!(runner.sink().actions, vec![Action::default()]);
    }

    #[tokio::test]
    async fn test_reset_failure_is_fatal() {
        let mut host = FakeHost::never_finishing();
        host.fail_reset = true;
        let mut runner = runner(ScriptedFrames::moving(), host, fast_config());

        let err = runner.run_episode(&brain()).await.unwrap_err();
        assert!(matches!(err, EpisodeError::Reset(_)));
        assert!(err.is_fatal());
        assert!(runner.sink().actions.is_empty());
    }

    #[tokio::test]
    async fn test_detector_is_reset_between_episodes() {
        let mut config = fast_config();
        config.lap_timeout = Duration::from_millis(50);
        let mut runner = runner(ScriptedFrames::moving(), FakeHost::never_finishing(), config);
        let brain = brain();

        runner.run_episode(&brain).await.unwrap();
        let first_lap_frames = runner.frames().next;
        assert_eq!(runner.detector().frame_count(), first_lap_frames);

        runner.run_episode(&brain).await.unwrap();
        let total_frames = runner.frames().next;
        assert_eq!(
            runner.detector().frame_count(),
            total_frames - first_lap_frames
        );
        assert_eq!(runner.host().resets, 2);
    }

    #[test]
    #[should_panic(expected = "tick interval")]
    fn test_zero_tick_interval_panics() {
        let config = EpisodeConfig {
            tick_interval: Duration::ZERO,
            ..fast_config()
        };
        let _ = runner(ScriptedFrames::still(), FakeHost::never_finishing(), config);
    }
}
