//! Collaborators that connect an episode to the running game.
//!
//! Screen capture, keyboard injection, and page automation are provided by the
//! embedding application. The episode runner only sees these traits.

use stig_brain::Action;

/// Capturing a screenshot failed.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("failed to capture frame: {message}")]
pub struct CaptureError {
    message: String,
}

impl CaptureError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pressing or releasing keys failed.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("failed to apply action: {message}")]
pub struct ApplyError {
    message: String,
}

impl ApplyError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The game page did not respond as expected.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("game host error: {message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces compressed screenshots (JPEG or PNG) of the game.
pub trait FrameSource {
    fn capture(&mut self) -> impl Future<Output = Result<Vec<u8>, CaptureError>>;
}

/// Holds down exactly the keys an [`Action`] implies and releases the rest.
///
/// Applying [`Action::default()`] releases every key.
pub trait ActionSink {
    fn apply(&mut self, action: Action) -> impl Future<Output = Result<(), ApplyError>>;
}

/// Controls the race itself.
pub trait EpisodeHost {
    /// Restarts the race from the start line and waits until it is ready.
    fn reset(&mut self) -> impl Future<Output = Result<(), HostError>>;

    /// Resolves once the game shows the finish indicator.
    fn wait_for_finish(&mut self) -> impl Future<Output = Result<(), HostError>>;

    /// Reads the race time text shown after finishing, e.g. `"01:49:214"`.
    fn final_time(&mut self) -> impl Future<Output = Result<String, HostError>>;
}
