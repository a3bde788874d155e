//! Subscription handles and teardown.
//!
//! Every open watch, primary or child, is owned by exactly one
//! `SubscriptionHandle`. A `Teardown` collects handles so a whole join graph
//! can be released with one call.

use crate::transport::Disposer;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use livejoin_core::{Error, Result};

/// An open watch plus the key it serves.
pub struct SubscriptionHandle {
    key: String,
    disposer: Option<Disposer>,
}

impl SubscriptionHandle {
    /// Creates a handle for the given key.
    pub fn new(key: impl Into<String>, disposer: Disposer) -> Self {
        Self {
            key: key.into(),
            disposer: Some(disposer),
        }
    }

    /// Returns the key this handle watches.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true until the disposer has run.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.disposer.is_some()
    }

    /// Runs the disposer.
    pub fn dispose(mut self) -> Result<()> {
        self.run()
    }

    /// Runs the disposer, logging instead of returning a failure.
    pub fn dispose_logged(mut self) -> bool {
        match self.run() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to dispose subscription");
                false
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        match self.disposer.take() {
            Some(disposer) => disposer().map_err(|err| match err {
                Error::Reconciliation { .. } => err,
                other => Error::reconciliation(self.key.clone(), other.to_string()),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Err(err) = self.run() {
            tracing::warn!(key = %self.key, error = %err, "failed to dispose dropped subscription");
        }
    }
}

impl core::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Aggregates subscription handles behind one disposer.
#[derive(Debug, Default)]
pub struct Teardown {
    handles: Vec<SubscriptionHandle>,
}

impl Teardown {
    /// Creates an empty teardown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle.
    pub fn push(&mut self, handle: SubscriptionHandle) {
        self.handles.push(handle);
    }

    /// Adds an optional handle.
    pub fn push_opt(&mut self, handle: Option<SubscriptionHandle>) {
        if let Some(handle) = handle {
            self.handles.push(handle);
        }
    }

    /// Returns the number of collected handles.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no handles were collected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Disposes every handle in insertion order.
    ///
    /// A failing disposer does not stop the remaining ones; failures are
    /// logged and returned.
    pub fn dispose_all(self) -> Vec<Error> {
        let mut failures = Vec::new();
        for handle in self.handles {
            let key = handle.key().to_string();
            if let Err(err) = handle.dispose() {
                tracing::warn!(key = %key, error = %err, "teardown: disposer failed");
                failures.push(err);
            }
        }
        failures
    }
}

impl Extend<SubscriptionHandle> for Teardown {
    fn extend<I: IntoIterator<Item = SubscriptionHandle>>(&mut self, iter: I) {
        self.handles.extend(iter);
    }
}
