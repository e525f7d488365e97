//! Synchronization callbacks registered against a unit of work.
//!
//! A synchronization is notified exactly once when its exchange finishes:
//! through [`Synchronization::on_complete`] when the exchange succeeded, or
//! through [`Synchronization::on_failure`] when it failed. Never both.

mod adapters;
mod ordering;

pub use adapters::{FnSynchronization, Ordered};
pub use ordering::{effective_order, DEFAULT_ORDER, HIGHEST_ORDER, LOWEST_ORDER};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::exchange::Exchange;

/// A completion callback registered by a processing stage.
///
/// Implementations may return any error; it is captured, logged and ignored.
/// Panics are caught as well.
pub trait Synchronization: Send + Sync {
    /// Called when the exchange completed successfully.
    fn on_complete(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Called when the exchange failed.
    fn on_failure(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Explicit ordering value. Lower values are notified earlier.
    ///
    /// `None` places the callback at [`DEFAULT_ORDER`].
    fn order(&self) -> Option<i32> {
        None
    }

    /// Name used in logs and reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Which entry point of a synchronization was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// `on_complete` was invoked.
    Complete,
    /// `on_failure` was invoked.
    Failure,
}

impl NotificationKind {
    /// Selects the entry point for an exchange failure flag.
    #[must_use]
    pub fn for_failed(failed: bool) -> Self {
        if failed {
            Self::Failure
        } else {
            Self::Complete
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "on_complete"),
            Self::Failure => write!(f, "on_failure"),
        }
    }
}

/// Identifies one registration on a unit of work.
///
/// Registering the same callback twice yields two distinct IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(u64);

impl RegistrationId {
    /// Creates a registration ID from a raw sequence number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A synchronization together with its registration ID.
#[derive(Clone)]
pub struct Registration {
    id: RegistrationId,
    synchronization: Arc<dyn Synchronization>,
}

impl Registration {
    /// Creates a registration entry.
    #[must_use]
    pub fn new(id: RegistrationId, synchronization: Arc<dyn Synchronization>) -> Self {
        Self {
            id,
            synchronization,
        }
    }

    /// Returns the registration ID.
    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Returns the registered callback.
    #[must_use]
    pub fn synchronization(&self) -> &Arc<dyn Synchronization> {
        &self.synchronization
    }

    /// Returns the callback name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.synchronization.name()
    }

    /// Returns the order used for dispatch.
    #[must_use]
    pub fn order(&self) -> i32 {
        effective_order(self.synchronization.as_ref())
    }

    /// Returns true if this entry points at the given callback.
    #[must_use]
    pub fn is(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        Arc::ptr_eq(&self.synchronization, synchronization)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("order", &self.order())
            .finish()
    }
}
