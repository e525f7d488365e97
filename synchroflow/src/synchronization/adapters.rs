//! Ready-made synchronization implementations.

use std::fmt;

use super::Synchronization;
use crate::exchange::Exchange;

type Handler = Box<dyn Fn(&Exchange) -> anyhow::Result<()> + Send + Sync>;

/// A synchronization built from closures.
///
/// Entry points without a handler succeed without doing anything.
pub struct FnSynchronization {
    name: String,
    order: Option<i32>,
    on_complete: Option<Handler>,
    on_failure: Option<Handler>,
}

impl FnSynchronization {
    /// Creates a synchronization with no handlers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: None,
            on_complete: None,
            on_failure: None,
        }
    }

    /// Creates a synchronization that runs the same handler on either outcome.
    #[must_use]
    pub fn on_done<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Exchange) -> anyhow::Result<()> + Send + Sync + Clone + 'static,
    {
        Self::new(name)
            .with_on_complete(handler.clone())
            .with_on_failure(handler)
    }

    /// Sets the success handler.
    #[must_use]
    pub fn with_on_complete<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Exchange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(handler));
        self
    }

    /// Sets the failure handler.
    #[must_use]
    pub fn with_on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Exchange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(handler));
        self
    }

    /// Sets an explicit order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

impl Synchronization for FnSynchronization {
    fn on_complete(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.on_complete.as_ref().map_or(Ok(()), |h| h(exchange))
    }

    fn on_failure(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.on_failure.as_ref().map_or(Ok(()), |h| h(exchange))
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnSynchronization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSynchronization")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Wraps a synchronization and overrides its order.
#[derive(Debug)]
pub struct Ordered<S> {
    inner: S,
    order: i32,
}

impl<S: Synchronization> Ordered<S> {
    /// Wraps `inner` with an explicit order.
    #[must_use]
    pub fn new(inner: S, order: i32) -> Self {
        Self { inner, order }
    }

    /// Returns the wrapped synchronization.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Synchronization> Synchronization for Ordered<S> {
    fn on_complete(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.inner.on_complete(exchange)
    }

    fn on_failure(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.inner.on_failure(exchange)
    }

    fn order(&self) -> Option<i32> {
        Some(self.order)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
