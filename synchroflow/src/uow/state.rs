//! Unit of work lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a unit of work.
///
/// `Created -> Active -> Done -> Stopped -> Detached`. No state is skipped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfWorkState {
    /// Constructed, not yet used.
    #[default]
    Created,
    /// Processing is under way.
    Active,
    /// Completion was signalled and callbacks dispatched.
    Done,
    /// Resources held by the unit of work were released.
    Stopped,
    /// Removed from its exchange. Terminal.
    Detached,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Active => write!(f, "active"),
            Self::Done => write!(f, "done"),
            Self::Stopped => write!(f, "stopped"),
            Self::Detached => write!(f, "detached"),
        }
    }
}

impl UnitOfWorkState {
    /// Returns the state that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Active),
            Self::Active => Some(Self::Done),
            Self::Done => Some(Self::Stopped),
            Self::Stopped => Some(Self::Detached),
            Self::Detached => None,
        }
    }

    /// Returns true if `to` directly follows this state.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to)
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Detached)
    }

    /// Returns true if completion has already been signalled.
    #[must_use]
    pub fn is_completed(self) -> bool {
        self >= Self::Done
    }

    /// Returns true if callbacks and resources may still be registered.
    #[must_use]
    pub fn accepts_registrations(self) -> bool {
        self < Self::Stopped
    }
}
