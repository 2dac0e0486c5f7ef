//! Motion detection from consecutive frames.
//!
//! The game exposes no position telemetry, so progress is estimated visually:
//! when the car drives, the road surface in the lower middle of the screen
//! changes between frames; when it is parked against a wall, it does not.
//!
//! # Motion Score
//!
//! For a pair of frames the score is computed over a region of interest (ROI):
//!
//! ```text
//! ROI     = x in [0.2 W, 0.8 W), y in [0.3 H, H)     (sampled every 4th pixel)
//! diff    = |rgb_prev - rgb_curr| / (255 * sqrt(3))   (Euclidean, in [0, 1])
//! weight  = (1 - |x - W/2| / (W/2) * 0.5) * (0.5 + 0.5 * (y - y0) / (H - y0))
//! score   = Σ diff * weight / sample_count
//! ```
//!
//! The horizontal factor peaks at the screen center and falls off by up to 50%
//! toward the ROI edges; the vertical factor favors rows near the bottom,
//! closest to the car.
//!
//! # Progress Tracking
//!
//! [`MotionDetector`] keeps the previous frame and accumulates the scores of
//! frame pairs above a threshold as "distance". The time since the last such
//! pair drives the stuck watchdog of an episode. All state sits behind a
//! single mutex so the control loop can feed frames while the watchdog reads
//! statistics.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use image::{Rgb, RgbImage};

use crate::frame::{self, DecodeError};

/// Default minimum score for a frame pair to count as motion.
pub const DEFAULT_MOTION_THRESHOLD: f32 = 0.01;

const ROI_LEFT: f32 = 0.2;
const ROI_RIGHT: f32 = 0.8;
const ROI_TOP: f32 = 0.3;
const SAMPLE_STRIDE: usize = 4;
// 255 * sqrt(3)
const MAX_RGB_DISTANCE: f32 = 441.672_96;

/// Snapshot of a detector's progress statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStats {
    /// Sum of all motion scores above the threshold since the last reset.
    pub total_distance: f32,
    /// Number of successfully decoded frames since the last reset.
    pub frame_count: usize,
    /// Time elapsed since the last frame pair above the threshold (or since
    /// the last reset, if none).
    pub time_since_motion: Duration,
}

#[derive(Debug)]
struct MotionState {
    previous: Option<RgbImage>,
    previous_at: Option<Instant>,
    last_motion_at: Instant,
    total_distance: f32,
    frame_count: usize,
}

impl MotionState {
    fn new(now: Instant) -> Self {
        Self {
            previous: None,
            previous_at: None,
            last_motion_at: now,
            total_distance: 0.0,
            frame_count: 0,
        }
    }
}

/// Tracks motion across the frames of one episode.
#[derive(Debug)]
pub struct MotionDetector {
    threshold: f32,
    state: Mutex<MotionState>,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MOTION_THRESHOLD)
    }
}

impl MotionDetector {
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: Mutex::new(MotionState::new(Instant::now())),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Feeds the next frame of the episode and returns its motion score.
    ///
    /// The first frame after a reset only primes the detector and scores `0`.
    /// A frame that fails to decode leaves the detector untouched.
    pub fn process_frame(&self, frame: &[u8]) -> Result<f32, DecodeError> {
        self.process_frame_at(frame, Instant::now())
    }

    /// Same as [`process_frame`](Self::process_frame), observed at `now`.
    ///
    /// Used to replay recorded laps with their original timing.
    pub fn process_frame_at(&self, frame: &[u8], now: Instant) -> Result<f32, DecodeError> {
        let current = frame::decode_rgb(frame)?;

        let mut state = self.lock();
        state.frame_count += 1;

        let score = match &state.previous {
            None => 0.0,
            Some(previous) => {
                let score = motion_score(previous, &current);
                if score > self.threshold {
                    state.last_motion_at = now;
                    state.total_distance += score;
                }
                score
            }
        };

        tracing::trace!(
            score,
            threshold = self.threshold,
            frame_delta = ?state.previous_at.map(|t| now.saturating_duration_since(t)),
            total_distance = state.total_distance,
            frame_count = state.frame_count,
            "processed frame"
        );

        state.previous = Some(current);
        state.previous_at = Some(now);
        Ok(score)
    }

    #[must_use]
    pub fn stats(&self) -> MotionStats {
        self.stats_at(Instant::now())
    }

    /// Returns the statistics as observed at `now`.
    #[must_use]
    pub fn stats_at(&self, now: Instant) -> MotionStats {
        let state = self.lock();
        MotionStats {
            total_distance: state.total_distance,
            frame_count: state.frame_count,
            time_since_motion: now.saturating_duration_since(state.last_motion_at),
        }
    }

    #[must_use]
    pub fn total_distance(&self) -> f32 {
        self.lock().total_distance
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.lock().frame_count
    }

    #[must_use]
    pub fn time_since_last_motion(&self) -> Duration {
        self.stats().time_since_motion
    }

    /// Clears all per-episode state. Must be called before every episode.
    pub fn reset(&self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&self, now: Instant) {
        *self.lock() = MotionState::new(now);
    }

    fn lock(&self) -> MutexGuard<'_, MotionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Computes the center- and bottom-weighted difference between two frames.
///
/// Pixels missing from `current` (smaller frame) compare against black.
/// Returns `0` when the region of interest contains no samples.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn motion_score(previous: &RgbImage, current: &RgbImage) -> f32 {
    let (width, height) = previous.dimensions();
    let x_start = (width as f32 * ROI_LEFT) as u32;
    let x_end = (width as f32 * ROI_RIGHT) as u32;
    let y_start = (height as f32 * ROI_TOP) as u32;
    let y_end = height;

    let center_x = width as f32 / 2.0;
    let roi_height = (y_end - y_start) as f32;

    let mut total = 0.0;
    let mut samples = 0_usize;
    for y in (y_start..y_end).step_by(SAMPLE_STRIDE) {
        let bottom_weight = (y - y_start) as f32 / roi_height;
        for x in (x_start..x_end).step_by(SAMPLE_STRIDE) {
            let before = *previous.get_pixel(x, y);
            let after = current.get_pixel_checked(x, y).copied().unwrap_or(Rgb([0, 0, 0]));
            let diff = rgb_distance(before, after) / MAX_RGB_DISTANCE;

            let center_weight = 1.0 - (x as f32 - center_x).abs() / center_x * 0.5;
            total += diff * center_weight * (0.5 + 0.5 * bottom_weight);
            samples += 1;
        }
    }

    if samples == 0 {
        return 0.0;
    }
    total / samples as f32
}

fn rgb_distance(a: Rgb<u8>, b: Rgb<u8>) -> f32 {
    a.0.iter()
        .zip(b.0)
        .map(|(&x, y)| (f32::from(x) - f32::from(y)).powi(2))
        .sum::<f32>()
        .sqrt()
}
