//! Mock synchronizations for testing.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

use crate::exchange::Exchange;
use crate::synchronization::{NotificationKind, Synchronization};
use crate::uow::UnitOfWork;

/// Shared, ordered record of notifications across several synchronizations.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<(String, NotificationKind)>>>,
}

impl NotificationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, name: &str, kind: NotificationKind) {
        self.entries.lock().push((name.to_string(), kind));
    }

    /// Returns all entries in notification order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, NotificationKind)> {
        self.entries.lock().clone()
    }

    /// Returns the notified names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns how often `name` was notified with `kind`.
    #[must_use]
    pub fn count(&self, name: &str, kind: NotificationKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(n, k)| n == name && *k == kind)
            .count()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A synchronization that records every notification and succeeds.
#[derive(Debug)]
pub struct RecordingSynchronization {
    name: String,
    order: Option<i32>,
    log: NotificationLog,
}

impl RecordingSynchronization {
    /// Creates a recorder writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &NotificationLog) -> Self {
        Self {
            name: name.into(),
            order: None,
            log: log.clone(),
        }
    }

    /// Sets an explicit order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

impl Synchronization for RecordingSynchronization {
    fn on_complete(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Complete);
        Ok(())
    }

    fn on_failure(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Failure);
        Ok(())
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A synchronization that records the notification and then returns an error.
#[derive(Debug)]
pub struct FailingSynchronization {
    name: String,
    error: String,
    log: NotificationLog,
}

impl FailingSynchronization {
    /// Creates a failing synchronization writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>, log: &NotificationLog) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            log: log.clone(),
        }
    }
}

impl Synchronization for FailingSynchronization {
    fn on_complete(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Complete);
        Err(anyhow::anyhow!("{}", self.error))
    }

    fn on_failure(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Failure);
        Err(anyhow::anyhow!("{}", self.error))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A synchronization that panics on every notification.
#[derive(Debug)]
pub struct PanickingSynchronization {
    name: String,
}

impl PanickingSynchronization {
    /// Creates a panicking synchronization.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Synchronization for PanickingSynchronization {
    fn on_complete(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        panic!("{} panicked in on_complete", self.name)
    }

    fn on_failure(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        panic!("{} panicked in on_failure", self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A synchronization that registers another one on its unit of work while
/// being notified.
pub struct RegisteringSynchronization {
    name: String,
    uow: Weak<UnitOfWork>,
    late: Mutex<Option<Arc<dyn Synchronization>>>,
    log: NotificationLog,
}

impl RegisteringSynchronization {
    /// Creates a synchronization that registers `late` on `uow` the first
    /// time it is notified.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        uow: &Arc<UnitOfWork>,
        late: Arc<dyn Synchronization>,
        log: &NotificationLog,
    ) -> Self {
        Self {
            name: name.into(),
            uow: Arc::downgrade(uow),
            late: Mutex::new(Some(late)),
            log: log.clone(),
        }
    }

    fn register_late(&self) -> anyhow::Result<()> {
        let late = self.late.lock().take();
        if let (Some(late), Some(uow)) = (late, self.uow.upgrade()) {
            uow.register_synchronization(late)?;
        }
        Ok(())
    }
}

impl Synchronization for RegisteringSynchronization {
    fn on_complete(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Complete);
        self.register_late()
    }

    fn on_failure(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        self.log.record(&self.name, NotificationKind::Failure);
        self.register_late()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
