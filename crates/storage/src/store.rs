//! In-memory live document store.
//!
//! `MemoryStore` keeps named collections of documents and serves live
//! queries over them. Every write re-evaluates the watchers of the written
//! collection and delivers the new result to each watcher whose result
//! changed. A new watcher receives its first result synchronously, from
//! inside `watch`.
//!
//! Callbacks are always invoked with no internal borrow held, so they may
//! open and dispose watches or write to the store.

use crate::collection::Collection;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use livejoin_core::{Document, Error, Result, Value};
use livejoin_query::{execute, QuerySpec};
use livejoin_reactive::{Disposer, Transport, WatchCallback};

/// Unique identifier of a registered watcher.
pub type WatchId = u64;

struct Watcher {
    spec: QuerySpec,
    callback: WatchCallback,
    /// Last delivered result; unchanged results are not re-delivered.
    last: Option<Vec<Document>>,
}

/// Per-collection watch statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Watches ever opened.
    pub opened: usize,
    /// Watches disposed.
    pub disposed: usize,
}

#[derive(Default)]
struct Faults {
    /// Collections whose new watches fail with the given message.
    failing_watches: HashMap<String, String>,
    /// Collections whose disposers report a failure.
    failing_disposers: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    collections: RefCell<BTreeMap<String, Collection>>,
    watchers: RefCell<HashMap<WatchId, Watcher>>,
    stats: RefCell<HashMap<String, WatchStats>>,
    faults: RefCell<Faults>,
    next_id: RefCell<WatchId>,
}

impl Inner {
    fn evaluate(&self, spec: &QuerySpec) -> Result<Vec<Document>> {
        let collections = self.collections.borrow();
        match collections.get(spec.collection()) {
            Some(collection) => execute(spec, collection.scan()),
            None => execute(spec, core::iter::empty()),
        }
    }

    /// Re-evaluates every watcher of `collection` and delivers changed results.
    fn notify(&self, collection: &str) {
        let mut ids: Vec<WatchId> = self
            .watchers
            .borrow()
            .iter()
            .filter(|(_, w)| w.spec.collection() == collection)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        for id in ids {
            let (spec, callback) = match self.watchers.borrow().get(&id) {
                Some(w) => (w.spec.clone(), w.callback.clone()),
                None => continue,
            };
            let event = self.evaluate(&spec);
            let changed = {
                let mut watchers = self.watchers.borrow_mut();
                match (watchers.get_mut(&id), &event) {
                    (Some(w), Ok(rows)) => {
                        if w.last.as_ref() == Some(rows) {
                            false
                        } else {
                            w.last = Some(rows.clone());
                            true
                        }
                    }
                    (Some(_), Err(_)) => true,
                    (None, _) => false,
                }
            };
            if changed {
                callback(event);
            }
        }
    }

    fn dispose(&self, id: WatchId, collection: &str) -> Result<()> {
        let removed = self.watchers.borrow_mut().remove(&id).is_some();
        if removed {
            let mut stats = self.stats.borrow_mut();
            stats.entry(collection.to_string()).or_default().disposed += 1;
        }
        if self.faults.borrow().failing_disposers.contains(collection) {
            return Err(Error::transport(collection, "failed to detach listener"));
        }
        Ok(())
    }
}

/// An in-memory document store serving live queries.
///
/// Cloning shares the underlying store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document. Returns its new version.
    pub fn put(&self, collection: &str, doc: Document) -> Result<u64> {
        let version = {
            let mut collections = self.inner.collections.borrow_mut();
            collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection::new(collection))
                .put(doc)?
        };
        self.inner.notify(collection);
        Ok(version)
    }

    /// Inserts or replaces many documents, notifying watchers once.
    pub fn put_all<I>(&self, collection: &str, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let count = {
            let mut collections = self.inner.collections.borrow_mut();
            let target = collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection::new(collection));
            let mut count = 0;
            for doc in docs {
                target.put(doc)?;
                count += 1;
            }
            count
        };
        self.inner.notify(collection);
        Ok(count)
    }

    /// Sets fields on an existing document. Returns its new version.
    pub fn update<'a, I>(&self, collection: &str, id: &str, fields: I) -> Result<u64>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let version = {
            let mut collections = self.inner.collections.borrow_mut();
            collections
                .get_mut(collection)
                .ok_or_else(|| Error::not_found(collection, id))?
                .update(id, fields)?
        };
        self.inner.notify(collection);
        Ok(version)
    }

    /// Removes a document.
    pub fn delete(&self, collection: &str, id: &str) -> Result<Document> {
        let removed = {
            let mut collections = self.inner.collections.borrow_mut();
            collections
                .get_mut(collection)
                .ok_or_else(|| Error::not_found(collection, id))?
                .delete(id)?
        };
        self.inner.notify(collection);
        Ok(removed)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner
            .collections
            .borrow()
            .get(collection)
            .and_then(|c| c.get(id).cloned())
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .borrow()
            .get(collection)
            .map(Collection::len)
            .unwrap_or(0)
    }

    /// Runs a query once.
    pub fn query(&self, spec: &QuerySpec) -> Result<Vec<Document>> {
        self.inner.evaluate(spec)
    }

    /// Number of watches ever opened on a collection.
    pub fn watch_count(&self, collection: &str) -> usize {
        self.stats(collection).opened
    }

    /// Number of watches on a collection that are still registered.
    pub fn active_watchers(&self, collection: &str) -> usize {
        self.inner
            .watchers
            .borrow()
            .values()
            .filter(|w| w.spec.collection() == collection)
            .count()
    }

    pub fn stats(&self, collection: &str) -> WatchStats {
        self.inner
            .stats
            .borrow()
            .get(collection)
            .copied()
            .unwrap_or_default()
    }

    /// Makes new watches on `collection` fail with `message`.
    pub fn fail_watches(&self, collection: &str, message: &str) {
        self.inner
            .faults
            .borrow_mut()
            .failing_watches
            .insert(collection.to_string(), message.to_string());
    }

    /// Delivers a transport error to every watcher of `collection`.
    pub fn break_watchers(&self, collection: &str, message: &str) {
        let callbacks: Vec<WatchCallback> = {
            let watchers = self.inner.watchers.borrow();
            let mut matching: Vec<(&WatchId, &Watcher)> = watchers
                .iter()
                .filter(|(_, w)| w.spec.collection() == collection)
                .collect();
            matching.sort_unstable_by_key(|(id, _)| **id);
            matching.into_iter().map(|(_, w)| w.callback.clone()).collect()
        };
        tracing::debug!(collection, watchers = callbacks.len(), "injecting watch failure");
        for callback in callbacks {
            callback(Err(Error::transport(collection, message)));
        }
    }

    /// Makes disposers of watches on `collection` report a failure.
    pub fn fail_disposers(&self, collection: &str) {
        self.inner
            .faults
            .borrow_mut()
            .failing_disposers
            .insert(collection.to_string());
    }

    /// Clears every injected fault.
    pub fn heal(&self) {
        let mut faults = self.inner.faults.borrow_mut();
        faults.failing_watches.clear();
        faults.failing_disposers.clear();
    }
}

impl Transport for MemoryStore {
    fn watch(&self, spec: &QuerySpec, callback: WatchCallback) -> Disposer {
        let collection = spec.collection().to_string();
        let id = {
            let mut next = self.inner.next_id.borrow_mut();
            *next += 1;
            *next
        };
        self.inner
            .stats
            .borrow_mut()
            .entry(collection.clone())
            .or_default()
            .opened += 1;

        let failure = self.inner.faults.borrow().failing_watches.get(&collection).cloned();
        let first = match failure {
            Some(message) => Err(Error::transport(collection.as_str(), message)),
            None => self.inner.evaluate(spec),
        };

        // failed listeners are not registered
        if let Ok(rows) = &first {
            self.inner.watchers.borrow_mut().insert(
                id,
                Watcher {
                    spec: spec.clone(),
                    callback: callback.clone(),
                    last: Some(rows.clone()),
                },
            );
        }
        tracing::debug!(collection = %collection, id, ok = first.is_ok(), "watch opened");
        callback(first);

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Box::new(move || match weak.upgrade() {
            Some(inner) => inner.dispose(id, &collection),
            None => Ok(()),
        })
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        if let Some(message) = self.inner.faults.borrow().failing_watches.get(collection) {
            return Err(Error::transport(collection, message.as_str()));
        }
        Ok(self.get(collection, id))
    }
}

impl core::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.inner.collections.borrow().len())
            .field("watchers", &self.inner.watchers.borrow().len())
            .finish()
    }
}
