//! The exchange: one message traversing the pipeline.
//!
//! Only the parts the completion protocol consumes are modelled here: identity,
//! correlation hints, the failure flag and the single unit of work slot.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::uow::UnitOfWork;

/// A unit of message data flowing through the pipeline.
///
/// The exchange owns its attached [`UnitOfWork`]; the unit of work refers back
/// to the exchange weakly.
pub struct Exchange {
    id: Uuid,
    breadcrumb_id: Option<String>,
    route_id: Option<String>,
    failed: AtomicBool,
    failure: RwLock<Option<String>>,
    unit_of_work: RwLock<Option<Arc<UnitOfWork>>>,
}

impl Exchange {
    /// Creates a new exchange with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Creates an exchange with a specific ID.
    #[must_use]
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            breadcrumb_id: None,
            route_id: None,
            failed: AtomicBool::new(false),
            failure: RwLock::new(None),
            unit_of_work: RwLock::new(None),
        }
    }

    /// Sets the breadcrumb ID used to correlate logs across exchanges.
    #[must_use]
    pub fn with_breadcrumb_id(mut self, breadcrumb_id: impl Into<String>) -> Self {
        self.breadcrumb_id = Some(breadcrumb_id.into());
        self
    }

    /// Sets the ID of the route the exchange entered through.
    #[must_use]
    pub fn with_route_id(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    /// Returns the exchange ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the breadcrumb ID, if any.
    #[must_use]
    pub fn breadcrumb_id(&self) -> Option<&str> {
        self.breadcrumb_id.as_deref()
    }

    /// Returns the route ID, if any.
    #[must_use]
    pub fn route_id(&self) -> Option<&str> {
        self.route_id.as_deref()
    }

    /// Returns true if processing of the exchange failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Sets the failure flag directly.
    ///
    /// Clearing the flag also clears any recorded failure message.
    pub fn set_failed(&self, failed: bool) {
        self.failed.store(failed, Ordering::SeqCst);
        if !failed {
            *self.failure.write() = None;
        }
    }

    /// Marks the exchange as failed with a message.
    pub fn fail(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Returns the recorded failure message, if any.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.failure.read().clone()
    }

    /// Returns the attached unit of work.
    #[must_use]
    pub fn unit_of_work(&self) -> Option<Arc<UnitOfWork>> {
        self.unit_of_work.read().clone()
    }

    /// Returns true if a unit of work is attached.
    #[must_use]
    pub fn has_unit_of_work(&self) -> bool {
        self.unit_of_work.read().is_some()
    }

    /// Replaces the attached unit of work, returning the previous one.
    ///
    /// Passing `None` detaches.
    pub fn set_unit_of_work(&self, uow: Option<Arc<UnitOfWork>>) -> Option<Arc<UnitOfWork>> {
        std::mem::replace(&mut *self.unit_of_work.write(), uow)
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("breadcrumb_id", &self.breadcrumb_id)
            .field("route_id", &self.route_id)
            .field("failed", &self.is_failed())
            .field(
                "unit_of_work",
                &self.unit_of_work.read().as_ref().map(|uow| uow.id()),
            )
            .finish()
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exchange[{}]", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uow::UnitOfWorkVariant;

    #[test]
    fn test_exchange_defaults() {
        let exchange = Exchange::new();
        assert!(!exchange.is_failed());
        assert!(exchange.failure_message().is_none());
        assert!(!exchange.has_unit_of_work());
        assert!(exchange.breadcrumb_id().is_none());
    }

    #[test]
    fn test_fail_and_clear() {
        let exchange = Exchange::new();
        exchange.fail("no route");
        assert!(exchange.is_failed());
        assert_eq!(exchange.failure_message().as_deref(), Some("no route"));

        exchange.set_failed(false);
        assert!(!exchange.is_failed());
        assert!(exchange.failure_message().is_none());
    }

    #[test]
    fn test_unit_of_work_slot_is_replaceable() {
        let exchange = Arc::new(Exchange::new());
        let first = Arc::new(UnitOfWork::new(&exchange, UnitOfWorkVariant::Baseline));
        let second = Arc::new(UnitOfWork::new(&exchange, UnitOfWorkVariant::Baseline));

        assert!(exchange.set_unit_of_work(Some(first.clone())).is_none());
        let previous = exchange.set_unit_of_work(Some(second.clone()));
        assert_eq!(previous.map(|u| u.id()), Some(first.id()));
        assert_eq!(exchange.unit_of_work().map(|u| u.id()), Some(second.id()));

        exchange.set_unit_of_work(None);
        assert!(!exchange.has_unit_of_work());
    }

    #[test]
    fn test_display_uses_id() {
        let id = Uuid::new_v4();
        let exchange = Exchange::with_id(id).with_route_id("orders");
        assert_eq!(exchange.to_string(), format!("Exchange[{id}]"));
        assert_eq!(exchange.route_id(), Some("orders"));
    }
}
