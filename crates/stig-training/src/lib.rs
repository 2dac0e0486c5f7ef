//! Hill-climbing trainer for the driving policy.
//!
//! This crate runs episodes (laps) against the live game through abstract
//! collaborators, scores them, and keeps a mutated network only when it beats
//! the best one seen so far.
//!
//! # How Training Works
//!
//! 1. **Mutate** - Copy the best network and add Gaussian noise to every weight
//! 2. **Run** - Drive one episode with the candidate
//! 3. **Score** - Turn the episode outcome into a comparable [`Score`]
//! 4. **Select** - Keep the candidate if it scored strictly better, and persist it
//! 5. **Repeat** - Until cancelled or an episode limit is reached
//!
//! There is no population, crossover, or gradient: this is a (1+1) evolution
//! strategy over a fixed topology.
//!
//! # Architecture
//!
//! ```text
//! Trainer (trainer)
//!     ↓ proposes candidate
//! EpisodeRunner (episode)
//!     ├─ control tick: FrameSource → PolicyNetwork → ActionSink, frame → MotionDetector
//!     ├─ stuck watchdog: MotionDetector stats
//!     └─ EpisodeHost: reset, wait for finish, final race time
//!     ↓ produces
//! EpisodeResult (score)
//!     ↓ scored by
//! EpisodeScorer
//!     ↓ compared against best
//! Trainer keeps or discards the candidate
//! ```
//!
//! The collaborator traits in [`host`] are the boundary to browser automation
//! and screen capture, which live outside this crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use stig_training::{EpisodeConfig, EpisodeRunner, Trainer, TrainerConfig};
//!
//! let mut runner = EpisodeRunner::new(frames, sink, host, detector, EpisodeConfig::default());
//! let mut trainer = Trainer::new(brain, TrainerConfig::default(), rng);
//! trainer.run(&mut runner).await?;
//! ```
//!
//! # Current Limitations
//!
//! - **No convergence guarantee**: local search can stall on a plateau
//! - **Noisy fitness**: a single episode decides each comparison, so a lucky run
//!   can replace a genuinely better network
//! - **Fixed mutation scale**: no step-size adaptation

pub use self::{episode::*, host::*, race_time::*, record::*, score::*, trainer::*};

pub mod episode;
pub mod host;
pub mod race_time;
pub mod record;
pub mod score;
pub mod trainer;
