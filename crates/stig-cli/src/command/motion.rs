use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use stig_vision::MotionDetector;

use crate::{
    config::Settings,
    dataset::{self, LabeledFrame},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct MotionArg {
    /// Directory of one recorded lap (`lap_<n>`)
    lap: PathBuf,
    /// Motion threshold, overriding STIG_MOTION_THRESHOLD
    #[arg(long)]
    threshold: Option<f32>,
    /// Stuck timeout in seconds, overriding STIG_STUCK_TIMEOUT_SECS
    #[arg(long)]
    stuck_timeout_secs: Option<u64>,
    /// Print the score of every frame
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionSample {
    pub(crate) elapsed: Duration,
    pub(crate) score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MotionReplay {
    pub(crate) samples: Vec<MotionSample>,
    pub(crate) skipped: usize,
    pub(crate) total_distance: f32,
    /// Longest time without motion observed at any recorded frame.
    pub(crate) longest_still: Duration,
    pub(crate) longest_still_at: Duration,
}

/// Feeds a recorded lap to `detector`, replaying the recorded timestamps.
pub(crate) fn replay(
    detector: &MotionDetector,
    frames: &[LabeledFrame],
) -> anyhow::Result<MotionReplay> {
    let start = Instant::now();
    detector.reset_at(start);

    let mut samples = vec![];
    let mut skipped = 0;
    let mut longest_still = Duration::ZERO;
    let mut longest_still_at = Duration::ZERO;
    let Some(first) = frames.first() else {
        return Ok(MotionReplay {
            samples,
            skipped,
            total_distance: 0.0,
            longest_still,
            longest_still_at,
        });
    };

    for frame in frames {
        let elapsed = frame.elapsed_since(first);
        let now = start + elapsed;
        let bytes = frame.read()?;
        match detector.process_frame_at(&bytes, now) {
            Ok(score) => samples.push(MotionSample { elapsed, score }),
            Err(err) => {
                tracing::warn!(path = %frame.path.display(), %err, "skipping frame");
                skipped += 1;
            }
        }
        let still = detector.stats_at(now).time_since_motion;
        if still > longest_still {
            longest_still = still;
            longest_still_at = elapsed;
        }
    }

    Ok(MotionReplay {
        samples,
        skipped,
        total_distance: detector.total_distance(),
        longest_still,
        longest_still_at,
    })
}

pub(crate) fn run(arg: &MotionArg) -> anyhow::Result<()> {
    let MotionArg {
        lap,
        threshold,
        stuck_timeout_secs,
        verbose,
    } = arg;
    let settings = Settings::from_env();
    let threshold = threshold.unwrap_or(settings.motion_threshold);
    let stuck_timeout = stuck_timeout_secs.map_or(settings.stuck_timeout, Duration::from_secs);

    let frames = dataset::read_lap(lap)?;
    let detector = MotionDetector::new(threshold);
    let replay = replay(&detector, &frames)?;

    if *verbose {
        println!("{:>6} {:>10} {:>8}", "Frame", "Time", "Score");
        for (i, sample) in replay.samples.iter().enumerate() {
            let marker = if sample.score > threshold { "*" } else { "" };
            println!(
                "{i:>6} {:>9.3}s {:>8.4} {marker}",
                sample.elapsed.as_secs_f64(),
                sample.score
            );
        }
        println!();
    }

    let duration = frames
        .last()
        .zip(frames.first())
        .map_or(Duration::ZERO, |(last, first)| last.elapsed_since(first));
    println!("Lap: {}", lap.display());
    println!(
        "  Frames: {} ({} skipped) over {:.3}s",
        replay.samples.len(),
        replay.skipped,
        duration.as_secs_f64()
    );
    println!("  Threshold: {threshold}");
    println!("  Total distance: {:.4}", replay.total_distance);
    println!(
        "  Longest motionless stretch: {:.3}s (at {:.3}s)",
        replay.longest_still.as_secs_f64(),
        replay.longest_still_at.as_secs_f64()
    );
    if replay.longest_still > stuck_timeout {
        println!(
            "  Stuck watchdog would fire (timeout {:.3}s)",
            stuck_timeout.as_secs_f64()
        );
    } else {
        println!(
            "  Stuck watchdog would not fire (timeout {:.3}s)",
            stuck_timeout.as_secs_f64()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::dataset::png_bytes;

    fn write_lap(dir: &Path, frames: &[(u64, u8)]) {
        for (millis, value) in frames {
            let name = format!("frame_{}_accelerate_.png", millis * 1_000_000);
            fs::write(dir.join(name), png_bytes(40, 40, *value)).unwrap();
        }
    }

    #[test]
    fn test_replay_uses_recorded_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        // still for 3s, then moving
        write_lap(
            dir.path(),
            &[(0, 50), (1_000, 50), (3_000, 50), (3_100, 250), (3_200, 0)],
        );
        let frames = dataset::read_lap(dir.path()).unwrap();

        let detector = MotionDetector::default();
        let replay = replay(&detector, &frames).unwrap();
        assert_eq!(replay.samples.len(), 5);
        assert_eq!(replay.skipped, 0);
        assert!(replay.samples[..3].iter().all(|s| s.score.abs() < f32::EPSILON));
        assert!(replay.samples[3].score > 0.1);
        assert!(replay.total_distance > 0.2);
        assert_eq!(replay.longest_still, Duration::from_secs(3));
        assert_eq!(replay.longest_still_at, Duration::from_secs(3));
        assert_eq!(detector.frame_count(), 5);
    }

    #[test]
    fn test_replay_skips_corrupt_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_lap(dir.path(), &[(0, 10), (100, 200)]);
        fs::write(dir.path().join("frame_50000000__.png"), b"corrupt").unwrap();
        let frames = dataset::read_lap(dir.path()).unwrap();

        let replay = replay(&MotionDetector::default(), &frames).unwrap();
        assert_eq!(replay.samples.len(), 2);
        assert_eq!(replay.skipped, 1);
        assert!(replay.total_distance > 0.1);
    }
}
