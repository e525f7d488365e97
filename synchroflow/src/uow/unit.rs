//! The unit of work entity.

use parking_lot::{ReentrantMutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

use super::resources::ResourceRegistry;
use super::state::UnitOfWorkState;
use super::variant::{CorrelationContext, DiagnosticScope, UnitOfWorkVariant};
use crate::dispatch::{self, DispatchPolicy, DispatchReport};
use crate::errors::{CompletionError, CompletionResult};
use crate::exchange::Exchange;
use crate::logging::CompletionLogger;
use crate::synchronization::{Registration, RegistrationId, Synchronization};

/// Bookkeeping scope for one exchange's traversal of the pipeline.
///
/// Holds the ordered registrations of [`Synchronization`] callbacks and drives
/// its own lifecycle. Once stopped it cannot be reused.
pub struct UnitOfWork {
    id: Uuid,
    exchange_id: Uuid,
    exchange: Weak<Exchange>,
    variant: UnitOfWorkVariant,
    state: RwLock<UnitOfWorkState>,
    dispatching: ReentrantMutex<()>,
    synchronizations: RwLock<Vec<Registration>>,
    next_registration: AtomicU64,
    resources: ResourceRegistry,
    diagnostics: RwLock<Option<DiagnosticScope>>,
}

impl UnitOfWork {
    /// Creates a unit of work of the given variant for an exchange.
    ///
    /// The result is not attached to the exchange and not yet active.
    #[must_use]
    pub fn new(exchange: &Arc<Exchange>, variant: UnitOfWorkVariant) -> Self {
        let id = Uuid::new_v4();
        let diagnostics = variant.is_diagnostic().then(|| {
            DiagnosticScope::new(
                CorrelationContext::new(exchange.id(), id)
                    .with_breadcrumb_id(exchange.breadcrumb_id().map(String::from))
                    .with_route_id(exchange.route_id().map(String::from)),
            )
        });

        Self {
            id,
            exchange_id: exchange.id(),
            exchange: Arc::downgrade(exchange),
            variant,
            state: RwLock::new(UnitOfWorkState::Created),
            dispatching: ReentrantMutex::new(()),
            synchronizations: RwLock::new(Vec::new()),
            next_registration: AtomicU64::new(1),
            resources: ResourceRegistry::new(),
            diagnostics: RwLock::new(diagnostics),
        }
    }

    /// Creates a unit of work, selecting the variant from the diagnostics flag.
    #[must_use]
    pub fn create(exchange: &Arc<Exchange>, diagnostics: Option<bool>) -> Self {
        Self::new(exchange, UnitOfWorkVariant::select(diagnostics))
    }

    /// Returns the unit of work ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the ID of the exchange this unit of work was created for.
    #[must_use]
    pub fn exchange_id(&self) -> Uuid {
        self.exchange_id
    }

    /// Returns the owning exchange if it is still alive.
    #[must_use]
    pub fn exchange(&self) -> Option<Arc<Exchange>> {
        self.exchange.upgrade()
    }

    /// Returns the variant.
    #[must_use]
    pub fn variant(&self) -> UnitOfWorkVariant {
        self.variant
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> UnitOfWorkState {
        *self.state.read()
    }

    /// Returns the correlation context while the diagnostic variant is live.
    #[must_use]
    pub fn correlation(&self) -> Option<CorrelationContext> {
        self.diagnostics.read().as_ref().map(|d| d.context.clone())
    }

    /// Activates the unit of work. Returns false if it was not freshly created.
    pub fn start(&self) -> bool {
        let mut state = self.state.write();
        self.activate(&mut state)
    }

    fn activate(&self, state: &mut UnitOfWorkState) -> bool {
        if *state != UnitOfWorkState::Created {
            return false;
        }
        *state = UnitOfWorkState::Active;
        debug!(uow_id = %self.id, exchange_id = %self.exchange_id, "Unit of work activated");
        true
    }

    /// Appends a synchronization. Duplicates are kept as separate entries.
    ///
    /// The first registration activates a freshly created unit of work.
    pub fn register_synchronization(
        &self,
        synchronization: Arc<dyn Synchronization>,
    ) -> CompletionResult<RegistrationId> {
        let mut state = self.state.write();
        if !state.accepts_registrations() {
            return Err(CompletionError::Rejected {
                uow_id: self.id,
                state: *state,
            });
        }
        self.activate(&mut state);

        let id = RegistrationId::new(self.next_registration.fetch_add(1, Ordering::SeqCst));
        self.synchronizations
            .write()
            .push(Registration::new(id, synchronization));
        Ok(id)
    }

    /// Removes the first registration of this exact callback.
    ///
    /// Returns true if one was removed.
    pub fn remove_synchronization(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        let mut synchronizations = self.synchronizations.write();
        match synchronizations.iter().position(|r| r.is(synchronization)) {
            Some(index) => {
                synchronizations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes a registration by ID. Returns true if it was present.
    pub fn remove_registration(&self, id: RegistrationId) -> bool {
        let mut synchronizations = self.synchronizations.write();
        match synchronizations.iter().position(|r| r.id() == id) {
            Some(index) => {
                synchronizations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the current registrations in insertion order.
    #[must_use]
    pub fn all_synchronizations(&self) -> Vec<Registration> {
        self.synchronizations.read().clone()
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn synchronization_count(&self) -> usize {
        self.synchronizations.read().len()
    }

    /// Registers a resource owned by the unit of work, released on stop.
    pub fn add_resource<F>(&self, name: impl Into<String>, release: F) -> CompletionResult<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let state = self.state.read();
        if !state.accepts_registrations() {
            return Err(CompletionError::Rejected {
                uow_id: self.id,
                state: *state,
            });
        }
        self.resources.register(name, release);
        Ok(())
    }

    /// Drops every resource registered under `name` without releasing it.
    ///
    /// Returns true if something was removed.
    pub fn remove_resource(&self, name: &str) -> bool {
        self.resources.discard(name)
    }

    /// Returns the number of resources awaiting release.
    #[must_use]
    pub fn pending_resources(&self) -> usize {
        self.resources.pending_count()
    }

    /// Runs `f` inside the correlation scope of a live diagnostic unit of work.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let span = self.diagnostics.read().as_ref().map(|d| d.span.clone());
        match span {
            Some(span) => span.in_scope(f),
            None => f(),
        }
    }

    /// Signals completion and dispatches the registered callbacks.
    ///
    /// Only the first call dispatches. Later calls, and calls after the unit
    /// of work has stopped, return a skipped report. A call from another
    /// thread waits until the running dispatch has returned.
    pub fn done(
        &self,
        exchange: &Exchange,
        policy: &DispatchPolicy,
        logger: &dyn CompletionLogger,
    ) -> DispatchReport {
        let _dispatching = self.dispatching.lock();
        {
            let mut state = self.state.write();
            self.activate(&mut state);
            if *state != UnitOfWorkState::Active {
                let current = *state;
                debug!(
                    uow_id = %self.id,
                    exchange_id = %exchange.id(),
                    state = %current,
                    "Unit of work already completed, skipping dispatch"
                );
                return DispatchReport::skipped(exchange.id(), exchange.is_failed());
            }
            *state = UnitOfWorkState::Done;
        }

        let failed = exchange.is_failed();
        self.in_scope(|| dispatch::run(self, exchange, failed, policy, logger))
    }

    /// Stops the unit of work and releases everything it holds.
    ///
    /// Repeated calls are no-ops. Stopping before `done` is a misuse error.
    /// Waits for a dispatch running on another thread to return first.
    pub fn stop(&self) -> CompletionResult<()> {
        let _dispatching = self.dispatching.lock();
        {
            let mut state = self.state.write();
            match *state {
                UnitOfWorkState::Done => *state = UnitOfWorkState::Stopped,
                current @ (UnitOfWorkState::Stopped | UnitOfWorkState::Detached) => {
                    debug!(uow_id = %self.id, state = %current, "Unit of work already stopped");
                    return Ok(());
                }
                from => {
                    return Err(CompletionError::InvalidTransition {
                        from,
                        to: UnitOfWorkState::Stopped,
                    })
                }
            }
        }

        self.synchronizations.write().clear();
        let scope = self.diagnostics.write().take();
        let failures = match scope {
            Some(scope) => scope.span.in_scope(|| self.resources.release_all()),
            None => self.resources.release_all(),
        };
        debug!(uow_id = %self.id, "Unit of work stopped");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CompletionError::Teardown {
                uow_id: self.id,
                failures,
            })
        }
    }

    /// Records that the unit of work was removed from its exchange.
    ///
    /// Returns true on the `Stopped -> Detached` transition.
    pub fn mark_detached(&self) -> bool {
        let mut state = self.state.write();
        if *state == UnitOfWorkState::Stopped {
            *state = UnitOfWorkState::Detached;
            true
        } else {
            let current = *state;
            if current != UnitOfWorkState::Detached {
                debug!(uow_id = %self.id, state = %current, "Detached before stop completed");
            }
            false
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("exchange_id", &self.exchange_id)
            .field("variant", &self.variant)
            .field("state", &self.state())
            .field("synchronizations", &self.synchronization_count())
            .field("resources", &self.pending_resources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CollectingCompletionLogger;
    use crate::synchronization::FnSynchronization;

    fn setup(variant: UnitOfWorkVariant) -> (Arc<Exchange>, UnitOfWork) {
        let exchange = Arc::new(Exchange::new().with_breadcrumb_id("crumb"));
        let uow = UnitOfWork::new(&exchange, variant);
        (exchange, uow)
    }

    fn noop(name: &str) -> Arc<dyn Synchronization> {
        Arc::new(FnSynchronization::new(name))
    }

    #[test]
    fn test_create_selects_variant() {
        let exchange = Arc::new(Exchange::new());
        assert_eq!(UnitOfWork::create(&exchange, None).variant(), UnitOfWorkVariant::Baseline);
        assert_eq!(
            UnitOfWork::create(&exchange, Some(true)).variant(),
            UnitOfWorkVariant::Diagnostic
        );
    }

    #[test]
    fn test_new_is_not_active() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        assert_eq!(uow.state(), UnitOfWorkState::Created);
        assert_eq!(uow.exchange_id(), exchange.id());
        assert!(uow.exchange().is_some());
        assert!(!exchange.has_unit_of_work());
    }

    #[test]
    fn test_start_only_once() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        assert!(uow.start());
        assert!(!uow.start());
        assert_eq!(uow.state(), UnitOfWorkState::Active);
    }

    #[test]
    fn test_first_registration_activates() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        uow.register_synchronization(noop("a")).unwrap();
        assert_eq!(uow.state(), UnitOfWorkState::Active);
    }

    #[test]
    fn test_duplicates_are_distinct_registrations() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let sync = noop("dup");

        let first = uow.register_synchronization(sync.clone()).unwrap();
        let second = uow.register_synchronization(sync.clone()).unwrap();

        assert_ne!(first, second);
        assert_eq!(uow.synchronization_count(), 2);
    }

    #[test]
    fn test_remove_first_match_only() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let sync = noop("dup");
        let other = noop("other");

        let first = uow.register_synchronization(sync.clone()).unwrap();
        uow.register_synchronization(other).unwrap();
        let last = uow.register_synchronization(sync.clone()).unwrap();

        assert!(uow.remove_synchronization(&sync));
        let ids: Vec<_> = uow.all_synchronizations().iter().map(Registration::id).collect();
        assert!(!ids.contains(&first));
        assert!(ids.contains(&last));

        let absent = noop("absent");
        assert!(!uow.remove_synchronization(&absent));
        assert_eq!(uow.synchronization_count(), 2);
    }

    #[test]
    fn test_remove_registration_by_id() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let id = uow.register_synchronization(noop("a")).unwrap();

        assert!(uow.remove_registration(id));
        assert!(!uow.remove_registration(id));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        uow.register_synchronization(noop("a")).unwrap();

        let snapshot = uow.all_synchronizations();
        uow.register_synchronization(noop("b")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(uow.synchronization_count(), 2);
    }

    #[test]
    fn test_done_dispatches_once() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();
        uow.register_synchronization(noop("a")).unwrap();

        let first = uow.done(&exchange, &DispatchPolicy::default(), &logger);
        let second = uow.done(&exchange, &DispatchPolicy::default(), &logger);

        assert_eq!(first.notified_count(), 1);
        assert!(!first.skipped);
        assert!(second.skipped);
        assert_eq!(second.notified_count(), 0);
        assert_eq!(uow.state(), UnitOfWorkState::Done);
    }

    #[test]
    fn test_done_from_created_passes_through_active() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();

        let report = uow.done(&exchange, &DispatchPolicy::default(), &logger);
        assert!(!report.skipped);
        assert_eq!(report.passes, 0);
        assert_eq!(uow.state(), UnitOfWorkState::Done);
    }

    #[test]
    fn test_stop_before_done_is_invalid() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        uow.start();

        let err = uow.stop().unwrap_err();
        assert!(matches!(
            err,
            CompletionError::InvalidTransition {
                from: UnitOfWorkState::Active,
                to: UnitOfWorkState::Stopped
            }
        ));
    }

    #[test]
    fn test_stop_is_idempotent_and_rejects_reuse() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();
        uow.register_synchronization(noop("a")).unwrap();
        uow.done(&exchange, &DispatchPolicy::default(), &logger);

        uow.stop().unwrap();
        uow.stop().unwrap();
        assert_eq!(uow.state(), UnitOfWorkState::Stopped);
        assert_eq!(uow.synchronization_count(), 0);

        let err = uow.register_synchronization(noop("late")).unwrap_err();
        assert!(matches!(err, CompletionError::Rejected { state: UnitOfWorkState::Stopped, .. }));
        assert!(uow.add_resource("late", || Ok(())).is_err());
    }

    #[test]
    fn test_stop_releases_resources_and_reports_failures() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();
        uow.add_resource("cursor", || Ok(())).unwrap();
        uow.add_resource("lease", || anyhow::bail!("lease expired")).unwrap();
        assert_eq!(uow.pending_resources(), 2);

        uow.done(&exchange, &DispatchPolicy::default(), &logger);
        let err = uow.stop().unwrap_err();

        match err {
            CompletionError::Teardown { uow_id, failures } => {
                assert_eq!(uow_id, uow.id());
                assert_eq!(failures, vec![("lease".to_string(), "lease expired".to_string())]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(uow.state(), UnitOfWorkState::Stopped);
        assert_eq!(uow.pending_resources(), 0);
    }

    #[test]
    fn test_removed_resource_is_not_released() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();
        uow.add_resource("cursor", || Ok(())).unwrap();
        uow.add_resource("lease", || anyhow::bail!("released after hand-off")).unwrap();

        assert!(uow.remove_resource("lease"));
        assert!(!uow.remove_resource("lease"));
        assert_eq!(uow.pending_resources(), 1);

        uow.done(&exchange, &DispatchPolicy::default(), &logger);
        uow.stop().unwrap();
        assert_eq!(uow.pending_resources(), 0);
    }

    #[test]
    fn test_stop_waits_for_running_dispatch() {
        use std::sync::atomic::AtomicBool;
        use std::sync::mpsc;
        use std::time::Duration;

        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let released = Arc::new(AtomicBool::new(false));
        let seen_released = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let flag = released.clone();
        uow.add_resource("lease", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let flag = released.clone();
        let seen = seen_released.clone();
        let started_tx = parking_lot::Mutex::new(started_tx);
        uow.register_synchronization(Arc::new(FnSynchronization::new("slow").with_on_complete(move |_| {
            started_tx.lock().send(()).ok();
            std::thread::sleep(Duration::from_millis(100));
            seen.store(flag.load(Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        })))
        .unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                uow.done(&exchange, &DispatchPolicy::default(), &CollectingCompletionLogger::new());
            });
            started_rx.recv().unwrap();
            let report = uow.done(&exchange, &DispatchPolicy::default(), &CollectingCompletionLogger::new());
            assert!(report.skipped);
            uow.stop().unwrap();
        });

        assert!(!seen_released.load(Ordering::SeqCst));
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(uow.state(), UnitOfWorkState::Stopped);
    }

    #[test]
    fn test_diagnostic_context_cleared_on_stop() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Diagnostic);
        let logger = CollectingCompletionLogger::new();

        let ctx = uow.correlation().unwrap();
        assert_eq!(ctx.exchange_id, exchange.id());
        assert_eq!(ctx.uow_id, uow.id());
        assert_eq!(ctx.breadcrumb_id.as_deref(), Some("crumb"));

        uow.done(&exchange, &DispatchPolicy::default(), &logger);
        uow.stop().unwrap();
        assert!(uow.correlation().is_none());
    }

    #[test]
    fn test_baseline_has_no_correlation() {
        let (_exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        assert!(uow.correlation().is_none());
        assert_eq!(uow.in_scope(|| 7), 7);
    }

    #[test]
    fn test_mark_detached_only_after_stop() {
        let (exchange, uow) = setup(UnitOfWorkVariant::Baseline);
        let logger = CollectingCompletionLogger::new();

        assert!(!uow.mark_detached());
        uow.done(&exchange, &DispatchPolicy::default(), &logger);
        uow.stop().unwrap();
        assert!(uow.mark_detached());
        assert!(!uow.mark_detached());
        assert_eq!(uow.state(), UnitOfWorkState::Detached);
    }

    #[test]
    fn test_weak_exchange_reference() {
        let exchange = Arc::new(Exchange::new());
        let uow = UnitOfWork::new(&exchange, UnitOfWorkVariant::Baseline);
        drop(exchange);
        assert!(uow.exchange().is_none());
    }
}
