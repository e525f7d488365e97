//! Resources held by a unit of work itself, released when it stops.

use parking_lot::Mutex;
use tracing::warn;

use crate::errors::panic_message;

type Release = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

struct Resource {
    name: String,
    release: Release,
}

/// Registry of release actions executed in LIFO order.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: Mutex<Vec<Resource>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a release action under a name.
    pub fn register<F>(&self, name: impl Into<String>, release: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.resources.lock().push(Resource {
            name: name.into(),
            release: Box::new(release),
        });
    }

    /// Forgets every resource named `name`; its release action never runs.
    pub fn discard(&self, name: &str) -> bool {
        let mut resources = self.resources.lock();
        let before = resources.len();
        resources.retain(|r| r.name != name);
        before != resources.len()
    }

    /// Releases everything in LIFO order.
    ///
    /// Failures and panics are collected as `(name, reason)` and never stop the
    /// remaining releases. The registry is empty afterwards.
    pub fn release_all(&self) -> Vec<(String, String)> {
        let resources = std::mem::take(&mut *self.resources.lock());
        let mut failures = Vec::new();

        for resource in resources.into_iter().rev() {
            let Resource { name, release } = resource;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(release));

            let reason = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic) => format!("release panicked: {}", panic_message(panic.as_ref())),
            };
            warn!(resource = %name, error = %reason, "Failed to release unit of work resource");
            failures.push((name, reason));
        }

        failures
    }

    /// Returns the number of unreleased resources.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.resources.lock().len()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
