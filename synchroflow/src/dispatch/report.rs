//! Per-callback outcomes and the aggregated dispatch report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::CompletionError;
use crate::synchronization::{NotificationKind, Registration, RegistrationId};

/// How a single notification ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The callback returned normally.
    Succeeded,
    /// The callback returned an error.
    Failed {
        /// The rendered error.
        error: String,
    },
    /// The callback panicked.
    Panicked {
        /// The panic message.
        message: String,
    },
}

impl OutcomeStatus {
    fn from_error(error: Option<&CompletionError>) -> Self {
        match error {
            None => Self::Succeeded,
            Some(CompletionError::CallbackPanicked { message, .. }) => Self::Panicked {
                message: message.clone(),
            },
            Some(CompletionError::Callback { message, .. }) => Self::Failed {
                error: message.clone(),
            },
            Some(other) => Self::Failed {
                error: other.to_string(),
            },
        }
    }
}

/// Record of one callback notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizationOutcome {
    /// The registration that was notified.
    pub registration: RegistrationId,
    /// Callback name.
    pub name: String,
    /// Order the callback was sorted by.
    pub order: i32,
    /// Entry point that was invoked.
    pub kind: NotificationKind,
    /// Dispatch pass, starting at 1.
    pub pass: usize,
    /// How the notification ended.
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Time spent in the callback.
    pub duration_ms: f64,
}

impl SynchronizationOutcome {
    /// Creates an outcome for a registration.
    #[must_use]
    pub fn new(
        registration: &Registration,
        kind: NotificationKind,
        pass: usize,
        error: Option<&CompletionError>,
        duration_ms: f64,
    ) -> Self {
        Self {
            registration: registration.id(),
            name: registration.name().to_string(),
            order: registration.order(),
            kind,
            pass,
            status: OutcomeStatus::from_error(error),
            duration_ms,
        }
    }

    /// Returns true if the callback returned normally.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }
}

/// Aggregated result of dispatching a unit of work's callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    /// The exchange that completed.
    pub exchange_id: Uuid,
    /// Failure flag read once at dispatch start.
    pub failed: bool,
    /// True if dispatch did not run because completion was already signalled.
    pub skipped: bool,
    /// Number of dispatch passes executed.
    pub passes: usize,
    /// Outcomes in notification order.
    pub outcomes: Vec<SynchronizationOutcome>,
    /// Registrations that arrived after the last pass and were not notified.
    pub late_skipped: usize,
}

impl DispatchReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(exchange_id: Uuid, failed: bool) -> Self {
        Self {
            exchange_id,
            failed,
            skipped: false,
            passes: 0,
            outcomes: Vec::new(),
            late_skipped: 0,
        }
    }

    /// Creates a report for a dispatch that did not run.
    #[must_use]
    pub fn skipped(exchange_id: Uuid, failed: bool) -> Self {
        Self {
            skipped: true,
            ..Self::new(exchange_id, failed)
        }
    }

    /// Returns the number of callbacks notified.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the outcomes that did not succeed.
    #[must_use]
    pub fn failures(&self) -> Vec<&SynchronizationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// Returns true if any callback failed or panicked.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_success())
    }

    /// Returns callback names in notification order.
    #[must_use]
    pub fn notification_order(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.name.clone()).collect()
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("exchange_id".to_string(), serde_json::json!(self.exchange_id.to_string()));
        map.insert("failed".to_string(), serde_json::json!(self.failed));
        map.insert("skipped".to_string(), serde_json::json!(self.skipped));
        map.insert("passes".to_string(), serde_json::json!(self.passes));
        map.insert("notified".to_string(), serde_json::json!(self.notified_count()));
        map.insert("late_skipped".to_string(), serde_json::json!(self.late_skipped));
        map.insert(
            "failures".to_string(),
            serde_json::json!(self
                .failures()
                .iter()
                .map(|o| serde_json::json!({
                    "registration": o.registration,
                    "name": o.name,
                    "kind": o.kind,
                    "status": o.status,
                }))
                .collect::<Vec<_>>()),
        );
        map
    }
}
