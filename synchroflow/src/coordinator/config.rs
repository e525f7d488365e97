//! Coordinator configuration.

use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchPolicy, LateRegistrationPolicy};
use crate::errors::CompletionResult;

/// Configuration for a [`CompletionCoordinator`](super::CompletionCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Whether new units of work use the diagnostic variant. `None` means baseline.
    #[serde(default)]
    pub diagnostic_logging: Option<bool>,
    /// Handling of registrations that arrive during dispatch.
    #[serde(default)]
    pub late_registrations: LateRegistrationPolicy,
    /// Upper bound on follow-up passes when redraining.
    #[serde(default = "default_max_redrain_passes")]
    pub max_redrain_passes: usize,
}

fn default_max_redrain_passes() -> usize {
    8
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            diagnostic_logging: None,
            late_registrations: LateRegistrationPolicy::default(),
            max_redrain_passes: default_max_redrain_passes(),
        }
    }
}

impl CoordinatorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> CompletionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the diagnostic logging flag.
    #[must_use]
    pub fn with_diagnostic_logging(mut self, enabled: bool) -> Self {
        self.diagnostic_logging = Some(enabled);
        self
    }

    /// Sets the late registration policy.
    #[must_use]
    pub fn with_late_registrations(mut self, policy: LateRegistrationPolicy) -> Self {
        self.late_registrations = policy;
        self
    }

    /// Sets the redrain bound.
    #[must_use]
    pub fn with_max_redrain_passes(mut self, passes: usize) -> Self {
        self.max_redrain_passes = passes;
        self
    }

    /// Returns the dispatch policy derived from this configuration.
    #[must_use]
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            late_registrations: self.late_registrations,
            max_redrain_passes: self.max_redrain_passes,
        }
    }
}
