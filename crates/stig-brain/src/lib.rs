//! The policy network ("brain") that drives the car.
//!
//! A brain maps one captured frame to one discrete [`Action`]. It is a tiny
//! fully-connected network trained without gradients: the trainer perturbs a
//! copy with Gaussian noise and keeps it if the resulting episode scores
//! better (see the `stig-training` crate).
//!
//! # Architecture
//!
//! ```text
//! frame (JPEG)
//!     ↓ stig_vision::FeatureExtractor (luma, fitted to input_size)
//! x ∈ [0,1]^input_size
//!     ↓ W1, B1, ReLU
//! h ∈ R^hidden_size
//!     ├─ W2T, B2T, softmax → throttle  [accelerate, brake, neutral]
//!     └─ W2S, B2S, softmax → steering  [left, right, straight]
//! ```
//!
//! Each head picks its most probable class (first one on ties).
//!
//! # Modules
//!
//! - [`action`] - closed throttle/steering enumerations
//! - [`network`] - construction, inference, and mutation
//! - [`brain_file`] - the binary on-disk format
//! - [`summary`] - weight statistics for inspection
//!
//! # Example
//!
//! ```rust,no_run
//! use rand::SeedableRng as _;
//! use stig_brain::PolicyNetwork;
//!
//! # let frame: Vec<u8> = todo!();
//! let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(42);
//! let brain = PolicyNetwork::random(80 * 60, 64, &mut rng);
//! let action = brain.predict(&frame)?;
//!
//! let candidate = brain.mutate(0.02, &mut rng)?;
//! candidate.save("brain.bin")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use self::{action::*, brain_file::*, network::*};

pub mod action;
pub mod brain_file;
pub mod network;
pub mod summary;
