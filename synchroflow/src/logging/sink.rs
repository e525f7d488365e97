//! Completion logger trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::coordinator::CompletionReport;
use crate::errors::CompletionError;

/// Receives the warnings and reports produced while completing exchanges.
///
/// Implementations must never panic or block the caller.
pub trait CompletionLogger: Send + Sync {
    /// Records a swallowed failure.
    fn warn(&self, message: &str, failure: &CompletionError);

    /// Receives the aggregated report of one `complete` call.
    fn report(&self, _report: &CompletionReport) {}
}

/// A logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCompletionLogger;

impl CompletionLogger for NoOpCompletionLogger {
    fn warn(&self, _message: &str, _failure: &CompletionError) {}
}

/// A logger that forwards to the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCompletionLogger;

impl CompletionLogger for TracingCompletionLogger {
    fn warn(&self, message: &str, failure: &CompletionError) {
        warn!(error_type = failure.kind(), error = %failure, "{}", message);
    }

    fn report(&self, report: &CompletionReport) {
        if report.has_failures() {
            debug!(
                exchange_id = %report.exchange_id,
                uow_id = ?report.uow_id,
                notified = report.notified_count(),
                failures = report.failure_count(),
                "Exchange completed with swallowed failures"
            );
        } else {
            trace!(
                exchange_id = %report.exchange_id,
                notified = report.notified_count(),
                "Exchange completed"
            );
        }
    }
}

/// A collecting logger for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingCompletionLogger {
    warnings: RwLock<Vec<(String, CompletionError)>>,
    reports: RwLock<Vec<CompletionReport>>,
}

impl CollectingCompletionLogger {
    /// Creates a new collecting logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<(String, CompletionError)> {
        self.warnings.read().clone()
    }

    /// Returns the number of collected warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.read().len()
    }

    /// Returns all collected reports.
    #[must_use]
    pub fn reports(&self) -> Vec<CompletionReport> {
        self.reports.read().clone()
    }

    /// Returns the most recent report.
    #[must_use]
    pub fn last_report(&self) -> Option<CompletionReport> {
        self.reports.read().last().cloned()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.read().is_empty() && self.reports.read().is_empty()
    }

    /// Clears everything collected.
    pub fn clear(&self) {
        self.warnings.write().clear();
        self.reports.write().clear();
    }
}

impl CompletionLogger for CollectingCompletionLogger {
    fn warn(&self, message: &str, failure: &CompletionError) {
        self.warnings
            .write()
            .push((message.to_string(), failure.clone()));
    }

    fn report(&self, report: &CompletionReport) {
        self.reports.write().push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronization::NotificationKind;
    use uuid::Uuid;

    fn sample_error() -> CompletionError {
        CompletionError::Callback {
            name: "tx".to_string(),
            phase: NotificationKind::Complete,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_noop_logger() {
        let logger = NoOpCompletionLogger;
        logger.warn("ignored", &sample_error());
        logger.report(&CompletionReport::new(Uuid::nil(), None));
        // Should not panic
    }

    #[test]
    fn test_tracing_logger() {
        let logger = TracingCompletionLogger;
        logger.warn("ignored", &sample_error());
        logger.report(&CompletionReport::new(Uuid::nil(), None));
        // Should not panic
    }

    #[test]
    fn test_collecting_logger() {
        let logger = CollectingCompletionLogger::new();
        assert!(logger.is_empty());

        logger.warn("first", &sample_error());
        logger.report(&CompletionReport::new(Uuid::nil(), None));

        assert_eq!(logger.warning_count(), 1);
        assert_eq!(logger.warnings()[0].0, "first");
        assert_eq!(logger.reports().len(), 1);
        assert!(logger.last_report().is_some());

        logger.clear();
        assert!(logger.is_empty());
    }
}
