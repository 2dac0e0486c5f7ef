//! Pixel-level perception for the driving agent.
//!
//! Captured frames arrive as compressed images (downscaled JPEG snapshots of the
//! game canvas). This crate turns them into the two signals the rest of the
//! system consumes:
//!
//! - [`features`] - a fixed-length luma vector fed to the policy network
//! - [`motion`] - a frame-to-frame motion score used as a progress proxy, plus
//!   the bookkeeping that decides when the car is stuck
//!
//! Both share the decoding step in [`frame`].
//!
//! # Example
//!
//! ```rust,no_run
//! use stig_vision::{FeatureExtractor, MotionDetector};
//!
//! # let frame: Vec<u8> = todo!(); // JPEG bytes from the capture pipeline
//! let extractor = FeatureExtractor::new(80 * 60);
//! let features = extractor.extract(&frame)?;
//! assert_eq!(features.len(), 80 * 60);
//!
//! let detector = MotionDetector::new(0.01);
//! let score = detector.process_frame(&frame)?;
//! # Ok::<(), stig_vision::DecodeError>(())
//! ```

pub use self::{features::*, frame::*, motion::*};

pub mod features;
pub mod frame;
pub mod motion;
