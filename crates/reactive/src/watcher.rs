//! Primary watcher.
//!
//! Tracks the one live subscription on the primary collection: the spec it
//! was opened with, its generation token and the page it serves. A watcher
//! opened for a reverse-order requery normalizes its rows back into display
//! order before they reach the pager.

use crate::handle::SubscriptionHandle;
use alloc::vec::Vec;
use livejoin_core::Document;
use livejoin_query::{QuerySpec, SortOrder};

#[derive(Debug)]
pub struct PrimaryWatcher {
    spec: QuerySpec,
    generation: u64,
    page: usize,
    reversed: bool,
    handle: Option<SubscriptionHandle>,
}

impl PrimaryWatcher {
    pub fn new(spec: QuerySpec, generation: u64, page: usize, reversed: bool) -> Self {
        Self {
            spec,
            generation,
            page,
            reversed,
            handle: None,
        }
    }

    #[inline]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn page(&self) -> usize {
        self.page
    }

    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.handle.as_ref().map(SubscriptionHandle::is_open).unwrap_or(false)
    }

    /// Stores the handle of the opened watch. Returns it back if one is
    /// already held.
    pub fn attach(&mut self, handle: SubscriptionHandle) -> Option<SubscriptionHandle> {
        if self.handle.is_some() {
            return Some(handle);
        }
        self.handle = Some(handle);
        None
    }

    pub fn into_handle(self) -> Option<SubscriptionHandle> {
        self.handle
    }

    /// Releases the watch, logging a failing disposer.
    pub fn release(self) {
        if let Some(handle) = self.handle {
            handle.dispose_logged();
        }
    }

    /// Puts delivered rows into display order under `order`.
    pub fn normalize(&self, mut rows: Vec<Document>, order: &SortOrder) -> Vec<Document> {
        if self.reversed {
            rows.sort_by(|a, b| order.compare(a, b));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;
    use livejoin_core::Value;
    use livejoin_query::{Boundary, Direction, Predicate};

    fn doc(id: &str, created: i64) -> Document {
        Document::new(id).with("createdAt", Value::Timestamp(created))
    }

    #[test]
    fn test_normalize_reversed_rows() {
        let spec = QuerySpec::new("zones")
            .with(Predicate::order_by("createdAt", Direction::Desc))
            .with(Predicate::limit(2));
        let reversed = spec.reversed().with_cursor(Boundary::new("c", Value::Timestamp(1)));
        let watcher = PrimaryWatcher::new(reversed, 1, 1, true);

        // reverse query delivers ascending
        let rows = watcher.normalize(vec![doc("b", 2), doc("a", 3)], &SortOrder::desc("createdAt"));
        let ids: Vec<&str> = rows.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_forward_rows_untouched() {
        let watcher = PrimaryWatcher::new(QuerySpec::new("zones"), 1, 1, false);
        let rows = watcher.normalize(vec![doc("b", 2), doc("a", 3)], &SortOrder::desc("createdAt"));
        assert_eq!(rows[0].id(), "b");
    }

    #[test]
    fn test_attach_once_and_release() {
        let count = Rc::new(Cell::new(0));
        let make = |count: &Rc<Cell<u32>>| {
            let count = count.clone();
            SubscriptionHandle::new(
                "primary",
                Box::new(move || {
                    count.set(count.get() + 1);
                    Ok(())
                }),
            )
        };

        let mut watcher = PrimaryWatcher::new(QuerySpec::new("zones"), 7, 2, false);
        assert!(!watcher.is_open());
        assert!(watcher.attach(make(&count)).is_none());
        assert!(watcher.is_open());
        let extra = watcher.attach(make(&count));
        assert!(extra.is_some());
        drop(extra);
        assert_eq!(count.get(), 1);

        assert_eq!(watcher.generation(), 7);
        assert_eq!(watcher.page(), 2);
        watcher.release();
        assert_eq!(count.get(), 2);
    }
}
