//! Cursor pagination.
//!
//! Pages are numbered from 1. For every visited page the pager keeps the
//! boundary records (first and last row) and, when allowed by the capacity,
//! the merged rows last emitted for it, so going back can replay a page
//! without querying the store again.

use crate::merge::JoinedRow;
use alloc::rc::Rc;
use alloc::vec::Vec;
use livejoin_core::Document;
use livejoin_query::{Boundary, SortOrder};

/// Boundary records of one page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageBoundary {
    pub first: Option<Boundary>,
    pub last: Option<Boundary>,
    /// Number of rows the page held.
    pub len: usize,
}

impl PageBoundary {
    /// Takes the boundaries of rows already in display order.
    pub fn of(rows: &[Document], order: &SortOrder) -> Self {
        Self {
            first: rows.first().map(|doc| Boundary::of(doc, order)),
            last: rows.last().map(|doc| Boundary::of(doc, order)),
            len: rows.len(),
        }
    }
}

/// What going back one page requires.
#[derive(Clone, Debug, PartialEq)]
pub enum PrevAction {
    /// Already on the first page.
    Noop,
    /// The page is cached; replay it.
    Replay { page: usize, rows: Rc<[JoinedRow]> },
    /// Re-query in reverse order, starting after `cursor`.
    Requery { page: usize, cursor: Boundary },
    /// The current page is empty: re-query forward after the last record of
    /// the page before the target, or from the start for page 1.
    Reload { page: usize, cursor: Option<Boundary> },
}

/// Page boundaries, page cache and the current index.
#[derive(Debug)]
pub struct CursorPager {
    limit: Option<usize>,
    current: usize,
    pages: Vec<PageBoundary>,
    cache: Vec<Option<Rc<[JoinedRow]>>>,
    capacity: Option<usize>,
}

impl CursorPager {
    /// Creates a pager. `limit: None` disables paging.
    pub fn new(limit: Option<usize>, capacity: Option<usize>) -> Self {
        Self {
            limit,
            current: 1,
            pages: Vec::new(),
            cache: Vec::new(),
            capacity,
        }
    }

    /// Forgets every page and returns to page 1.
    pub fn reset(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.current = 1;
        self.pages.clear();
        self.cache.clear();
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.limit.is_some()
    }

    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Current 1-based page index.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of pages with a boundary record.
    #[inline]
    pub fn recorded(&self) -> usize {
        self.pages.len()
    }

    pub fn boundary(&self, page: usize) -> Option<&PageBoundary> {
        page.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    /// True if the current page came back full.
    pub fn has_more(&self) -> bool {
        match (self.limit, self.boundary(self.current)) {
            (Some(limit), Some(bounds)) => bounds.len == limit,
            _ => false,
        }
    }

    /// The page to open next and the cursor to open it with.
    pub fn next_target(&self) -> Option<(usize, Boundary)> {
        if !self.has_more() {
            return None;
        }
        let last = self.boundary(self.current)?.last.clone()?;
        Some((self.current + 1, last))
    }

    /// Decides how to go back one page.
    pub fn previous(&self) -> PrevAction {
        if self.current <= 1 {
            return PrevAction::Noop;
        }
        let page = self.current - 1;
        if let Some(rows) = self.cached(page) {
            return PrevAction::Replay { page, rows };
        }
        if let Some(cursor) = self.boundary(self.current).and_then(|b| b.first.clone()) {
            return PrevAction::Requery { page, cursor };
        }
        if page == 1 {
            return PrevAction::Reload { page, cursor: None };
        }
        match self.boundary(page - 1).and_then(|b| b.last.clone()) {
            Some(cursor) => PrevAction::Reload {
                page,
                cursor: Some(cursor),
            },
            None => PrevAction::Noop,
        }
    }

    /// Makes `page` current.
    ///
    /// Moving forward drops every record and cached page from `page` on, so
    /// the new page is recorded fresh.
    pub fn enter(&mut self, page: usize) {
        let page = page.max(1);
        if page > self.current {
            self.pages.truncate(page - 1);
            self.cache.truncate(page - 1);
        }
        self.current = page;
    }

    /// Records the boundaries of the current page.
    pub fn record(&mut self, bounds: PageBoundary) {
        let index = self.current - 1;
        while self.pages.len() <= index {
            self.pages.push(PageBoundary::default());
        }
        self.pages[index] = bounds;
    }

    /// Caches the rows emitted for the current page.
    pub fn store_rows(&mut self, rows: Rc<[JoinedRow]>) {
        let index = self.current - 1;
        while self.cache.len() <= index {
            self.cache.push(None);
        }
        self.cache[index] = Some(rows);
        self.evict();
    }

    /// Returns the cached rows of a page.
    pub fn cached(&self, page: usize) -> Option<Rc<[JoinedRow]>> {
        page.checked_sub(1)
            .and_then(|i| self.cache.get(i))
            .and_then(|slot| slot.clone())
    }

    /// Number of cached pages.
    pub fn cached_pages(&self) -> usize {
        self.cache.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drops cached pages farthest from the current one until within capacity.
    fn evict(&mut self) {
        let capacity = match self.capacity {
            Some(capacity) => capacity,
            None => return,
        };
        while self.cached_pages() > capacity {
            let current = self.current;
            let victim = self
                .cache
                .iter()
                .enumerate()
                .filter(|(i, slot)| slot.is_some() && i + 1 != current)
                .max_by_key(|(i, _)| (i + 1).abs_diff(current))
                .map(|(i, _)| i);
            match victim {
                Some(i) => {
                    tracing::debug!(page = i + 1, "evicting cached page");
                    self.cache[i] = None;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use livejoin_core::Value;

    fn doc(id: &str, created: i64) -> Document {
        Document::new(id).with("createdAt", Value::Timestamp(created))
    }

    fn rows(ids: &[&str]) -> Rc<[JoinedRow]> {
        ids.iter()
            .map(|id| JoinedRow {
                document: Document::new(*id),
                joins: BTreeMap::new(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn order() -> SortOrder {
        SortOrder::desc("createdAt")
    }

    #[test]
    fn test_page_boundary_of() {
        let page = vec![doc("a", 3), doc("b", 2)];
        let bounds = PageBoundary::of(&page, &order());
        assert_eq!(bounds.first, Some(Boundary::new("a", Value::Timestamp(3))));
        assert_eq!(bounds.last, Some(Boundary::new("b", Value::Timestamp(2))));
        assert_eq!(bounds.len, 2);
        assert_eq!(PageBoundary::of(&[], &order()), PageBoundary::default());
    }

    #[test]
    fn test_disabled_pager() {
        let mut pager = CursorPager::new(None, None);
        pager.record(PageBoundary::of(&[doc("a", 1)], &order()));
        assert!(!pager.is_enabled());
        assert!(!pager.has_more());
        assert_eq!(pager.next_target(), None);
        assert_eq!(pager.previous(), PrevAction::Noop);
    }

    #[test]
    fn test_has_more_when_page_full() {
        let mut pager = CursorPager::new(Some(2), None);
        pager.record(PageBoundary::of(&[doc("a", 3), doc("b", 2)], &order()));
        assert!(pager.has_more());
        assert_eq!(
            pager.next_target(),
            Some((2, Boundary::new("b", Value::Timestamp(2))))
        );

        pager.record(PageBoundary::of(&[doc("a", 3)], &order()));
        assert!(!pager.has_more());
        assert_eq!(pager.next_target(), None);
    }

    #[test]
    fn test_previous_replays_cached_page() {
        let mut pager = CursorPager::new(Some(1), None);
        pager.record(PageBoundary::of(&[doc("a", 3)], &order()));
        let page1 = rows(&["a"]);
        pager.store_rows(page1.clone());

        pager.enter(2);
        pager.record(PageBoundary::of(&[doc("b", 2)], &order()));
        pager.store_rows(rows(&["b"]));

        match pager.previous() {
            PrevAction::Replay { page, rows } => {
                assert_eq!(page, 1);
                assert!(Rc::ptr_eq(&rows, &page1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_previous_requeries_without_cache() {
        let mut pager = CursorPager::new(Some(1), Some(1));
        pager.record(PageBoundary::of(&[doc("a", 3)], &order()));
        pager.store_rows(rows(&["a"]));
        pager.enter(2);
        pager.record(PageBoundary::of(&[doc("b", 2)], &order()));
        pager.store_rows(rows(&["b"]));

        // capacity 1 keeps only the current page
        assert_eq!(pager.cached_pages(), 1);
        assert!(pager.cached(1).is_none());
        assert_eq!(
            pager.previous(),
            PrevAction::Requery {
                page: 1,
                cursor: Boundary::new("b", Value::Timestamp(2)),
            }
        );
    }

    #[test]
    fn test_previous_from_empty_page_reloads_forward() {
        let mut pager = CursorPager::new(Some(1), Some(1));
        for (page, id) in [(1, "a"), (2, "b")] {
            pager.enter(page);
            pager.record(PageBoundary::of(&[doc(id, 10 - page as i64)], &order()));
            pager.store_rows(rows(&[id]));
        }
        pager.enter(3);
        pager.record(PageBoundary::default());
        pager.store_rows(rows(&[]));

        assert_eq!(
            pager.previous(),
            PrevAction::Reload {
                page: 2,
                cursor: Some(Boundary::new("a", Value::Timestamp(9))),
            }
        );

        pager.enter(2);
        pager.record(PageBoundary::default());
        assert_eq!(pager.previous(), PrevAction::Reload { page: 1, cursor: None });
    }

    #[test]
    fn test_enter_forward_truncates() {
        let mut pager = CursorPager::new(Some(1), None);
        for (page, id) in [(1, "a"), (2, "b"), (3, "c")] {
            pager.enter(page);
            pager.record(PageBoundary::of(&[doc(id, 10 - page as i64)], &order()));
            pager.store_rows(rows(&[id]));
        }
        assert_eq!(pager.recorded(), 3);

        pager.enter(1);
        assert_eq!(pager.recorded(), 3);
        pager.enter(2);
        assert_eq!(pager.recorded(), 1);
        assert!(pager.cached(1).is_some());
        assert!(pager.cached(3).is_none());
    }

    #[test]
    fn test_evicts_farthest_page() {
        let mut pager = CursorPager::new(Some(1), Some(2));
        for (page, id) in [(1, "a"), (2, "b"), (3, "c")] {
            pager.enter(page);
            pager.record(PageBoundary::of(&[doc(id, 10 - page as i64)], &order()));
            pager.store_rows(rows(&[id]));
        }
        assert!(pager.cached(1).is_none());
        assert!(pager.cached(2).is_some());
        assert!(pager.cached(3).is_some());
    }

    #[test]
    fn test_reset() {
        let mut pager = CursorPager::new(Some(1), None);
        pager.record(PageBoundary::of(&[doc("a", 1)], &order()));
        pager.store_rows(rows(&["a"]));
        pager.enter(2);
        pager.reset(Some(5));
        assert_eq!(pager.current(), 1);
        assert_eq!(pager.recorded(), 0);
        assert_eq!(pager.cached_pages(), 0);
        assert_eq!(pager.limit(), Some(5));
    }
}
