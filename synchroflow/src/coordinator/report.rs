//! Aggregated result of completing one exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::DispatchReport;

/// Everything that happened during one `complete` call.
///
/// Handed to the logger; never returned to the caller of `complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    /// The exchange that completed.
    pub exchange_id: Uuid,
    /// The unit of work passed in, if any.
    pub uow_id: Option<Uuid>,
    /// Callback dispatch result, absent when there was no unit of work or done panicked.
    pub dispatch: Option<DispatchReport>,
    /// Swallowed errors from the done and stop steps.
    pub errors: Vec<String>,
    /// Whether the exchange's unit of work slot was cleared.
    pub detached: bool,
    /// When completion finished.
    pub completed_at: DateTime<Utc>,
}

impl CompletionReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(exchange_id: Uuid, uow_id: Option<Uuid>) -> Self {
        Self {
            exchange_id,
            uow_id,
            dispatch: None,
            errors: Vec::new(),
            detached: false,
            completed_at: Utc::now(),
        }
    }

    /// Returns the number of callbacks notified.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.dispatch.as_ref().map_or(0, DispatchReport::notified_count)
    }

    /// Returns the number of callback failures plus step errors.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.dispatch.as_ref().map_or(0, |d| d.failures().len()) + self.errors.len()
    }

    /// Returns true if anything was swallowed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }
}
