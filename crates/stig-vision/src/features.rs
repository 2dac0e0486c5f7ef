//! Frame to feature-vector conversion for the policy network.
//!
//! Every pixel becomes one feature: its luma (`0.299 R + 0.587 G + 0.114 B`)
//! scaled to `[0, 1]`, emitted in row-major order. The vector is then fitted
//! to the network's input size: longer vectors are truncated, shorter ones are
//! zero-padded at the end. This tolerates small resolution drifts in the
//! capture pipeline without reshaping the network.

use image::{Rgb, RgbImage};

use crate::frame::{self, DecodeError};

const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Returns the luma of an 8-bit RGB pixel, normalized to `[0, 1]`.
#[must_use]
pub fn luma(pixel: Rgb<u8>) -> f32 {
    let Rgb([r, g, b]) = pixel;
    let value = LUMA_WEIGHTS[0] * f32::from(r)
        + LUMA_WEIGHTS[1] * f32::from(g)
        + LUMA_WEIGHTS[2] * f32::from(b);
    (value / f32::from(u8::MAX)).clamp(0.0, 1.0)
}

/// Converts frames into fixed-length luma vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureExtractor {
    input_size: usize,
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(input_size: usize) -> Self {
        Self { input_size }
    }

    /// Length of every vector this extractor produces.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Decodes `frame` and returns its feature vector.
    pub fn extract(&self, frame: &[u8]) -> Result<Vec<f32>, DecodeError> {
        let image = frame::decode_rgb(frame)?;
        Ok(self.extract_image(&image))
    }

    /// Returns the feature vector of an already decoded image.
    #[must_use]
    pub fn extract_image(&self, image: &RgbImage) -> Vec<f32> {
        let mut features = Vec::with_capacity(self.input_size);
        features.extend(image.pixels().take(self.input_size).map(|p| luma(*p)));
        features.resize(self.input_size, 0.0);
        features
    }
}
