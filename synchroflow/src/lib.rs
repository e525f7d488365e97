//! # Synchroflow
//!
//! Completion coordination for exchanges flowing through a mediation pipeline.
//!
//! Processing stages register [`Synchronization`](synchronization::Synchronization)
//! callbacks on the exchange's [`UnitOfWork`](uow::UnitOfWork). When the exchange
//! finishes, the [`CompletionCoordinator`](coordinator::CompletionCoordinator):
//!
//! - **Notifies every callback exactly once**: `on_complete` or `on_failure`, never both
//! - **Unwinds in reverse registration order**: explicit orders override, ties stay stable
//! - **Isolates failures**: errors and panics are logged and ignored
//! - **Always tears down**: the unit of work is stopped and detached no matter what
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use synchroflow::prelude::*;
//!
//! let coordinator = CompletionCoordinator::new(CoordinatorConfig::default());
//! let exchange = Arc::new(Exchange::new());
//! let uow = coordinator.begin(&exchange);
//!
//! uow.register_synchronization(Arc::new(
//!     FnSynchronization::new("release-lease").with_on_complete(|_| Ok(())),
//! ))
//! .unwrap();
//!
//! coordinator.complete(Some(&*uow), &exchange);
//! assert!(!exchange.has_unit_of_work());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod coordinator;
pub mod dispatch;
pub mod errors;
pub mod exchange;
pub mod logging;
pub mod synchronization;
pub mod testing;
pub mod uow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coordinator::{
        CompletionCoordinator, CompletionReport, CoordinatorConfig, LateRegistrationPolicy,
    };
    pub use crate::dispatch::{DispatchPolicy, DispatchReport, OutcomeStatus, SynchronizationOutcome};
    pub use crate::errors::{CompletionError, CompletionResult};
    pub use crate::exchange::Exchange;
    pub use crate::logging::{
        init_logging, CollectingCompletionLogger, CompletionLogger, LogFormat,
        NoOpCompletionLogger, TracingCompletionLogger,
    };
    pub use crate::synchronization::{
        FnSynchronization, NotificationKind, Ordered, Registration, RegistrationId,
        Synchronization, DEFAULT_ORDER, HIGHEST_ORDER, LOWEST_ORDER,
    };
    pub use crate::uow::{CorrelationContext, UnitOfWork, UnitOfWorkState, UnitOfWorkVariant};
}
