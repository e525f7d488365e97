//! Error types for the synchroflow completion protocol.
//!
//! None of these errors ever escape [`CompletionCoordinator::complete`]; they
//! are captured into outcomes and reports and handed to the logging sink.
//!
//! [`CompletionCoordinator::complete`]: crate::coordinator::CompletionCoordinator::complete

use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::synchronization::NotificationKind;
use crate::uow::UnitOfWorkState;

/// Result alias used throughout the crate.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// The main error type for completion coordination.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// A synchronization callback returned an error.
    #[error("Synchronization '{name}' failed during {phase}: {message}")]
    Callback {
        /// The synchronization name.
        name: String,
        /// Which entry point was invoked.
        phase: NotificationKind,
        /// The rendered error chain.
        message: String,
    },

    /// A synchronization callback panicked.
    #[error("Synchronization '{name}' panicked during {phase}: {message}")]
    CallbackPanicked {
        /// The synchronization name.
        name: String,
        /// Which entry point was invoked.
        phase: NotificationKind,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// One or more resources held by a unit of work failed to release.
    #[error("Failed to release {} resource(s) of unit of work {uow_id}: {}", failures.len(), render_failures(failures))]
    Teardown {
        /// The unit of work being stopped.
        uow_id: Uuid,
        /// `(resource name, reason)` pairs in release order.
        failures: Vec<(String, String)>,
    },

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid unit of work transition from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: UnitOfWorkState,
        /// The requested state.
        to: UnitOfWorkState,
    },

    /// A registration was attempted on a unit of work that can no longer accept one.
    #[error("Unit of work {uow_id} is {state} and cannot accept registrations")]
    Rejected {
        /// The unit of work.
        uow_id: Uuid,
        /// Its state at the time of the call.
        state: UnitOfWorkState,
    },

    /// A whole completion step panicked.
    #[error("Panic during {step}: {message}")]
    Panicked {
        /// The step that panicked (`done` or `stop`).
        step: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn render_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CompletionError {
    /// Creates a callback error from an `anyhow` error, keeping the full chain.
    #[must_use]
    pub fn callback(name: impl Into<String>, phase: NotificationKind, error: &anyhow::Error) -> Self {
        Self::Callback {
            name: name.into(),
            phase,
            message: format!("{error:#}"),
        }
    }

    /// Creates a callback panic error from a panic payload.
    #[must_use]
    pub fn callback_panicked(
        name: impl Into<String>,
        phase: NotificationKind,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        Self::CallbackPanicked {
            name: name.into(),
            phase,
            message: panic_message(payload),
        }
    }

    /// Creates a step panic error from a panic payload.
    #[must_use]
    pub fn panicked(step: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::Panicked {
            step: step.into(),
            message: panic_message(payload),
        }
    }

    /// Returns a short stable type name for this error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Callback { .. } => "CallbackFailed",
            Self::CallbackPanicked { .. } => "CallbackPanicked",
            Self::Teardown { .. } => "TeardownFailed",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Rejected { .. } => "RegistrationRejected",
            Self::Panicked { .. } => "StepPanicked",
            Self::Serialization(_) => "Serialization",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));

        match self {
            Self::Callback { name, phase, .. } | Self::CallbackPanicked { name, phase, .. } => {
                map.insert("synchronization".to_string(), serde_json::json!(name));
                map.insert("phase".to_string(), serde_json::json!(phase.to_string()));
            }
            Self::Teardown { uow_id, failures } => {
                map.insert("uow_id".to_string(), serde_json::json!(uow_id.to_string()));
                map.insert(
                    "resources".to_string(),
                    serde_json::json!(failures.iter().map(|(n, _)| n).collect::<Vec<_>>()),
                );
            }
            Self::InvalidTransition { from, to } => {
                map.insert("from".to_string(), serde_json::json!(from.to_string()));
                map.insert("to".to_string(), serde_json::json!(to.to_string()));
            }
            Self::Rejected { uow_id, state } => {
                map.insert("uow_id".to_string(), serde_json::json!(uow_id.to_string()));
                map.insert("state".to_string(), serde_json::json!(state.to_string()));
            }
            Self::Panicked { step, .. } => {
                map.insert("step".to_string(), serde_json::json!(step));
            }
            Self::Serialization(_) => {}
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_keeps_chain() {
        let err = anyhow::anyhow!("connection reset").context("commit failed");
        let err = CompletionError::callback("tx", NotificationKind::Complete, &err);

        let text = err.to_string();
        assert!(text.contains("'tx'"));
        assert!(text.contains("commit failed: connection reset"));
        assert_eq!(err.kind(), "CallbackFailed");
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");

        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned.as_ref()), "owned boom");

        let other: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_teardown_error_lists_resources() {
        let err = CompletionError::Teardown {
            uow_id: Uuid::nil(),
            failures: vec![
                ("socket".to_string(), "already closed".to_string()),
                ("file".to_string(), "busy".to_string()),
            ],
        };

        assert!(err.to_string().contains("2 resource(s)"));
        assert!(err.to_string().contains("socket: already closed; file: busy"));

        let dict = err.to_dict();
        assert_eq!(dict.get("type").unwrap(), "TeardownFailed");
        assert_eq!(dict.get("resources").unwrap(), &serde_json::json!(["socket", "file"]));
    }

    #[test]
    fn test_invalid_transition_to_dict() {
        let err = CompletionError::InvalidTransition {
            from: UnitOfWorkState::Active,
            to: UnitOfWorkState::Stopped,
        };
        let dict = err.to_dict();

        assert_eq!(dict.get("from").unwrap(), "active");
        assert_eq!(dict.get("to").unwrap(), "stopped");
    }

    #[test]
    fn test_serialization_from_serde() {
        let err: CompletionError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "Serialization");
    }
}
