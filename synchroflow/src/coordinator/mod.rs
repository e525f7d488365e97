//! Completion coordination.
//!
//! The coordinator holds no per-exchange state. It creates units of work and,
//! when an exchange finishes, runs the teardown sequence:
//!
//! 1. `done`: dispatch callbacks (failures swallowed)
//! 2. `stop`: release unit of work resources (failures swallowed)
//! 3. detach the unit of work from the exchange, always

mod config;
mod report;


pub use config::CoordinatorConfig;
pub use report::CompletionReport;

pub use crate::dispatch::LateRegistrationPolicy;

use std::sync::Arc;
use tracing::debug;

use crate::errors::CompletionError;
use crate::exchange::Exchange;
use crate::logging::{CompletionLogger, TracingCompletionLogger};
use crate::uow::{UnitOfWork, UnitOfWorkVariant};

/// Drives the completion protocol for exchanges.
///
/// Cheap to share across threads; every exchange carries its own unit of work.
#[derive(Clone)]
pub struct CompletionCoordinator {
    config: CoordinatorConfig,
    logger: Arc<dyn CompletionLogger>,
}

impl CompletionCoordinator {
    /// Creates a coordinator that logs through `tracing`.
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_logger(config, Arc::new(TracingCompletionLogger))
    }

    /// Creates a coordinator with an explicit logger.
    #[must_use]
    pub fn with_logger(config: CoordinatorConfig, logger: Arc<dyn CompletionLogger>) -> Self {
        Self { config, logger }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the variant new units of work will use.
    #[must_use]
    pub fn variant(&self) -> UnitOfWorkVariant {
        UnitOfWorkVariant::select(self.config.diagnostic_logging)
    }

    /// Creates a fresh, inactive unit of work for an exchange.
    ///
    /// The unit of work is not attached to the exchange.
    #[must_use]
    pub fn create_unit_of_work(&self, exchange: &Arc<Exchange>) -> Arc<UnitOfWork> {
        Arc::new(UnitOfWork::new(exchange, self.variant()))
    }

    /// Creates a unit of work, attaches it to the exchange and activates it.
    ///
    /// A unit of work already attached is replaced.
    pub fn begin(&self, exchange: &Arc<Exchange>) -> Arc<UnitOfWork> {
        let uow = self.create_unit_of_work(exchange);
        if let Some(previous) = exchange.set_unit_of_work(Some(uow.clone())) {
            debug!(
                exchange_id = %exchange.id(),
                previous_uow_id = %previous.id(),
                "Replaced unit of work still attached to exchange"
            );
        }
        uow.start();
        uow
    }

    /// Completes an exchange.
    ///
    /// Never fails and never panics on behalf of callbacks: everything that
    /// goes wrong is logged and ignored. The exchange's unit of work slot is
    /// always empty afterwards.
    pub fn complete(&self, uow: Option<&UnitOfWork>, exchange: &Exchange) {
        let mut report = CompletionReport::new(exchange.id(), uow.map(UnitOfWork::id));

        if let Some(uow) = uow {
            let policy = self.config.dispatch_policy();
            let done = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                uow.done(exchange, &policy, self.logger.as_ref())
            }));
            match done {
                Ok(dispatch) => report.dispatch = Some(dispatch),
                Err(panic) => {
                    let err = CompletionError::panicked("done", panic.as_ref());
                    self.logger.warn(
                        &format!("Error occurred during done UnitOfWork for {exchange}. This error will be ignored."),
                        &err,
                    );
                    report.errors.push(err.to_string());
                }
            }

            let stop = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| uow.stop()));
            let stop_error = match stop {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(panic) => Some(CompletionError::panicked("stop", panic.as_ref())),
            };
            if let Some(err) = stop_error {
                self.logger.warn(
                    &format!("Error occurred during stopping UnitOfWork for {exchange}. This error will be ignored."),
                    &err,
                );
                report.errors.push(err.to_string());
            }
        }

        exchange.set_unit_of_work(None);
        if let Some(uow) = uow {
            uow.mark_detached();
        }
        report.detached = true;

        self.logger.report(&report);
    }

    /// Completes an exchange using whatever unit of work is attached to it.
    pub fn complete_attached(&self, exchange: &Exchange) {
        let uow = exchange.unit_of_work();
        self.complete(uow.as_deref(), exchange);
    }
}

impl Default for CompletionCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl std::fmt::Debug for CompletionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CollectingCompletionLogger;
    use crate::uow::UnitOfWorkState;

    fn coordinator(config: CoordinatorConfig) -> (CompletionCoordinator, Arc<CollectingCompletionLogger>) {
        let logger = Arc::new(CollectingCompletionLogger::new());
        (CompletionCoordinator::with_logger(config, logger.clone()), logger)
    }

    #[test]
    fn test_create_defaults_to_baseline() {
        let (coordinator, _) = coordinator(CoordinatorConfig::new());
        let exchange = Arc::new(Exchange::new());

        let uow = coordinator.create_unit_of_work(&exchange);
        assert_eq!(uow.variant(), UnitOfWorkVariant::Baseline);
        assert_eq!(uow.state(), UnitOfWorkState::Created);
        assert!(!exchange.has_unit_of_work());
    }

    #[test]
    fn test_create_diagnostic_variant() {
        let (coordinator, _) = coordinator(CoordinatorConfig::new().with_diagnostic_logging(true));
        let exchange = Arc::new(Exchange::new());

        let uow = coordinator.create_unit_of_work(&exchange);
        assert_eq!(uow.variant(), UnitOfWorkVariant::Diagnostic);
        assert!(uow.correlation().is_some());
    }

    #[test]
    fn test_begin_attaches_and_activates() {
        let (coordinator, _) = coordinator(CoordinatorConfig::new());
        let exchange = Arc::new(Exchange::new());

        let uow = coordinator.begin(&exchange);
        assert_eq!(uow.state(), UnitOfWorkState::Active);
        assert_eq!(exchange.unit_of_work().map(|u| u.id()), Some(uow.id()));

        let replacement = coordinator.begin(&exchange);
        assert_eq!(exchange.unit_of_work().map(|u| u.id()), Some(replacement.id()));
    }

    #[test]
    fn test_complete_without_uow_still_detaches() {
        let (coordinator, logger) = coordinator(CoordinatorConfig::new());
        let exchange = Arc::new(Exchange::new());
        let stray = coordinator.begin(&exchange);

        coordinator.complete(None, &exchange);

        assert!(!exchange.has_unit_of_work());
        assert_eq!(stray.state(), UnitOfWorkState::Active);
        let report = logger.last_report().unwrap();
        assert!(report.detached);
        assert!(report.dispatch.is_none());
        assert_eq!(report.uow_id, None);
    }

    #[test]
    fn test_complete_attached() {
        let (coordinator, logger) = coordinator(CoordinatorConfig::new());
        let exchange = Arc::new(Exchange::new());
        let uow = coordinator.begin(&exchange);

        coordinator.complete_attached(&exchange);

        assert_eq!(uow.state(), UnitOfWorkState::Detached);
        assert!(!exchange.has_unit_of_work());
        assert_eq!(logger.last_report().unwrap().uow_id, Some(uow.id()));
    }

    #[test]
    fn test_default_coordinator() {
        let coordinator = CompletionCoordinator::default();
        assert_eq!(coordinator.variant(), UnitOfWorkVariant::Baseline);
        assert!(format!("{coordinator:?}").contains("CompletionCoordinator"));
    }
}
