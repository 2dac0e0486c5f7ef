//! Discrete driving actions.
//!
//! The game only honors one throttle key and one steering key at a time, so an
//! action holds exactly one value per axis. Class indices match the output
//! order of the network heads.

/// Longitudinal control.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Throttle {
    #[display("accelerate")]
    Accelerate,
    #[display("brake")]
    Brake,
    #[default]
    #[display("neutral")]
    Neutral,
}

impl Throttle {
    /// All values in head output order.
    pub const ALL: [Self; 3] = [Self::Accelerate, Self::Brake, Self::Neutral];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Accelerate => 0,
            Self::Brake => 1,
            Self::Neutral => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Accelerate),
            1 => Some(Self::Brake),
            2 => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Lateral control.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Steering {
    #[display("left")]
    Left,
    #[display("right")]
    Right,
    #[default]
    #[display("straight")]
    Straight,
}

impl Steering {
    /// All values in head output order.
    pub const ALL: [Self; 3] = [Self::Left, Self::Right, Self::Straight];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Straight => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::Straight),
            _ => None,
        }
    }
}

/// A complete control state: one throttle and one steering value.
///
/// The default action releases every key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{throttle}/{steering}")]
pub struct Action {
    pub throttle: Throttle,
    pub steering: Steering,
}

impl Action {
    #[must_use]
    pub const fn new(throttle: Throttle, steering: Steering) -> Self {
        Self { throttle, steering }
    }
}
