//! Callback dispatch.
//!
//! Dispatch always works on a fixed copy of the registrations: the copy is
//! reversed so the most recent registration is notified first, then stably
//! sorted by order. Each callback is invoked in isolation; an error or panic
//! is captured into its [`SynchronizationOutcome`] and the loop moves on.

mod report;

pub use report::{DispatchReport, OutcomeStatus, SynchronizationOutcome};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::errors::CompletionError;
use crate::exchange::Exchange;
use crate::logging::CompletionLogger;
use crate::synchronization::{NotificationKind, Registration, RegistrationId};
use crate::uow::UnitOfWork;

/// What to do with registrations that arrive while dispatch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateRegistrationPolicy {
    /// Leave them un-notified; they are only counted in the report.
    #[default]
    Skip,
    /// Run follow-up passes for them until none remain.
    Redrain,
}

/// Parameters for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Handling of late registrations.
    pub late_registrations: LateRegistrationPolicy,
    /// Upper bound on follow-up passes under [`LateRegistrationPolicy::Redrain`].
    pub max_redrain_passes: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            late_registrations: LateRegistrationPolicy::Skip,
            max_redrain_passes: 8,
        }
    }
}

impl DispatchPolicy {
    /// Creates a redraining policy with the given bound.
    #[must_use]
    pub fn redrain(max_redrain_passes: usize) -> Self {
        Self {
            late_registrations: LateRegistrationPolicy::Redrain,
            max_redrain_passes,
        }
    }
}

/// Returns registrations in notification order: reversed, then stably sorted
/// by ascending order.
#[must_use]
pub fn dispatch_order(snapshot: &[Registration]) -> Vec<Registration> {
    let mut copy = snapshot.to_vec();
    copy.reverse();
    copy.sort_by_key(Registration::order);
    copy
}

/// Notifies every registration in `snapshot` once.
///
/// `failed` selects the entry point for the whole pass.
pub fn dispatch_synchronizations(
    exchange: &Exchange,
    failed: bool,
    snapshot: &[Registration],
    pass: usize,
    logger: &dyn CompletionLogger,
) -> Vec<SynchronizationOutcome> {
    if snapshot.is_empty() {
        return Vec::new();
    }

    let kind = NotificationKind::for_failed(failed);
    dispatch_order(snapshot)
        .iter()
        .map(|registration| notify(registration, exchange, kind, pass, logger))
        .collect()
}

fn notify(
    registration: &Registration,
    exchange: &Exchange,
    kind: NotificationKind,
    pass: usize,
    logger: &dyn CompletionLogger,
) -> SynchronizationOutcome {
    trace!(
        synchronization = registration.name(),
        registration = %registration.id(),
        exchange_id = %exchange.id(),
        "Invoking synchronization.{}", kind
    );

    let synchronization = registration.synchronization();
    let started = Instant::now();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match kind {
        NotificationKind::Complete => synchronization.on_complete(exchange),
        NotificationKind::Failure => synchronization.on_failure(exchange),
    }));
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    let error = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(CompletionError::callback(registration.name(), kind, &e)),
        Err(panic) => Some(CompletionError::callback_panicked(
            registration.name(),
            kind,
            panic.as_ref(),
        )),
    };

    if let Some(ref err) = error {
        logger.warn(
            &format!("Error occurred during {kind} for {exchange}. This error will be ignored."),
            err,
        );
    }

    SynchronizationOutcome::new(registration, kind, pass, error.as_ref(), duration_ms)
}

/// Runs the full dispatch for a unit of work, including follow-up passes.
pub(crate) fn run(
    uow: &UnitOfWork,
    exchange: &Exchange,
    failed: bool,
    policy: &DispatchPolicy,
    logger: &dyn CompletionLogger,
) -> DispatchReport {
    let mut report = DispatchReport::new(exchange.id(), failed);
    let mut notified: HashSet<RegistrationId> = HashSet::new();
    let mut snapshot = uow.all_synchronizations();

    loop {
        let pending: Vec<Registration> = snapshot
            .into_iter()
            .filter(|r| !notified.contains(&r.id()))
            .collect();
        if pending.is_empty() {
            break;
        }

        if report.passes > 0 {
            let exhausted = report.passes > policy.max_redrain_passes;
            if policy.late_registrations == LateRegistrationPolicy::Skip || exhausted {
                report.late_skipped = pending.len();
                if exhausted {
                    warn!(
                        uow_id = %uow.id(),
                        exchange_id = %exchange.id(),
                        pending = pending.len(),
                        passes = report.passes,
                        "Redrain limit reached, late synchronizations will not be notified"
                    );
                } else {
                    debug!(
                        uow_id = %uow.id(),
                        exchange_id = %exchange.id(),
                        pending = pending.len(),
                        "Synchronizations registered during dispatch were not notified"
                    );
                }
                break;
            }
        }

        report.passes += 1;
        notified.extend(pending.iter().map(Registration::id));
        report.outcomes.extend(dispatch_synchronizations(
            exchange,
            failed,
            &pending,
            report.passes,
            logger,
        ));
        snapshot = uow.all_synchronizations();
    }

    report
}
