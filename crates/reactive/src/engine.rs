//! The live join engine.
//!
//! `LiveJoin` is configured once per primary collection and hands out one
//! `LiveSubscription` per `subscribe()` call. Each subscription owns its own
//! join graph: the primary watcher, a pending watcher while navigating, one
//! child watch per active foreign key and the pager.
//!
//! Transport callbacks reach the engine through `Weak` references and carry
//! the generation of the watch that produced them. No `RefCell` borrow is held
//! while calling into the transport or the caller, so a transport may deliver
//! synchronously from inside `watch` and callers may navigate or dispose from
//! inside their own callbacks.

use crate::fanout::{PendingOpen, Relation, RelationState};
use crate::handle::{SubscriptionHandle, Teardown};
use crate::merge::{merge, JoinedRow, Snapshot};
use crate::pager::{CursorPager, PageBoundary, PrevAction};
use crate::transport::{Transport, WatchCallback, WatchEvent};
use crate::watcher::PrimaryWatcher;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use livejoin_core::{Document, Error, Result, DOCUMENT_ID_FIELD};
use livejoin_query::{build_spec, FieldMap, Filters, QuerySpec, SortOrder};

/// Shared configuration of every subscription created by a `LiveJoin`.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub collection: String,
    pub fields: FieldMap,
    pub relations: Vec<Relation>,
    /// Page size used when the filters carry none. `None` disables paging.
    pub default_limit: Option<usize>,
    /// Maximum number of cached pages. `None` keeps every visited page.
    pub page_cache_capacity: Option<usize>,
}

impl EngineConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: FieldMap::default(),
            relations: Vec::new(),
            default_limit: None,
            page_cache_capacity: None,
        }
    }

    /// Builds the primary spec for `filters`, applying the default page size.
    pub fn spec_for(&self, filters: &Filters) -> QuerySpec {
        let mut filters = filters.clone();
        if filters.limit.is_none() {
            filters.limit = self.default_limit;
        }
        build_spec(&self.collection, &self.fields, &filters)
    }
}

/// Builder for `LiveJoin`.
#[derive(Clone, Debug)]
pub struct LiveJoinBuilder {
    config: EngineConfig,
}

impl LiveJoinBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            config: EngineConfig::new(collection),
        }
    }

    /// Sets the store field names used by the filters.
    pub fn fields(mut self, fields: FieldMap) -> Self {
        self.config.fields = fields;
        self
    }

    /// Adds a joined relation.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.config.relations.push(relation);
        self
    }

    /// Sets the page size used when the filters carry none.
    pub fn page_size(mut self, limit: usize) -> Self {
        self.config.default_limit = Some(limit);
        self
    }

    /// Bounds the number of cached pages.
    pub fn page_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.page_cache_capacity = Some(capacity);
        self
    }

    pub fn build(self, transport: Rc<dyn Transport>) -> LiveJoin {
        LiveJoin {
            transport,
            config: Rc::new(self.config),
        }
    }
}

/// Entry point: live joined views over one primary collection.
#[derive(Clone)]
pub struct LiveJoin {
    transport: Rc<dyn Transport>,
    config: Rc<EngineConfig>,
}

impl LiveJoin {
    pub fn builder(collection: impl Into<String>) -> LiveJoinBuilder {
        LiveJoinBuilder::new(collection)
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens a live joined view.
    ///
    /// `on_rows` receives every merged snapshot, `on_error` every transport
    /// error. The view stays live until the returned subscription is disposed
    /// or dropped.
    pub fn subscribe<R, E>(&self, filters: Filters, on_rows: R, on_error: E) -> LiveSubscription
    where
        R: Fn(&Snapshot) + 'static,
        E: Fn(&Error) + 'static,
    {
        let spec = self.config.spec_for(&filters);
        let order = sort_order_of(&spec);
        let relations = self
            .config
            .relations
            .iter()
            .cloned()
            .map(RelationState::new)
            .collect();

        let engine = Rc::new(Engine {
            transport: self.transport.clone(),
            on_rows: Box::new(on_rows),
            on_error: Box::new(on_error),
            state: RefCell::new(EngineState {
                pager: CursorPager::new(spec.limit(), self.config.page_cache_capacity),
                filters,
                spec: spec.clone(),
                order,
                primary: None,
                pending: None,
                visible: Vec::new(),
                relations,
                last: None,
                next_generation: 0,
                pass_depth: 0,
                disposed: false,
                failed: false,
            }),
            config: self.config.clone(),
        });

        tracing::debug!(collection = %self.config.collection, "opening live join");
        engine.open_primary(spec, 1, false, Slot::Primary);
        LiveSubscription { engine }
    }

    /// Reads one primary document by id.
    pub fn fetch(&self, id: &str) -> Result<Option<Document>> {
        self.transport.get_document(&self.config.collection, id)
    }

    /// Reads one primary document by id, failing if it does not exist.
    pub fn fetch_required(&self, id: &str) -> Result<Document> {
        self.fetch(id)?
            .ok_or_else(|| Error::not_found(self.config.collection.as_str(), id))
    }
}

impl core::fmt::Debug for LiveJoin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LiveJoin").field("config", &self.config).finish()
    }
}

/// A live joined view. Dropping it disposes the whole join graph.
pub struct LiveSubscription {
    engine: Rc<Engine>,
}

impl LiveSubscription {
    /// Opens the next page. No-op without more rows, while another page is
    /// loading, or after disposal.
    pub fn go_next(&self) {
        self.engine.go_next();
    }

    /// Returns to the previous page, from cache when possible.
    pub fn go_previous(&self) {
        self.engine.go_previous();
    }

    /// Replaces the filters. Re-opens at page 1 only if the resulting query
    /// differs.
    pub fn set_filters(&self, filters: Filters) {
        self.engine.set_filters(filters);
    }

    /// Releases the primary watch and every child watch. Idempotent.
    pub fn dispose(&self) {
        self.engine.teardown();
    }

    /// The last emitted snapshot, still readable after disposal.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.engine.state.borrow().last.clone()
    }

    /// Current 1-based page.
    pub fn page(&self) -> usize {
        self.engine.state.borrow().pager.current()
    }

    pub fn has_more(&self) -> bool {
        self.engine.state.borrow().pager.has_more()
    }

    /// Keys with an open child watch for `relation`, sorted.
    pub fn active_keys(&self, relation: &str) -> Vec<String> {
        self.engine
            .state
            .borrow()
            .relations
            .iter()
            .find(|state| state.relation().name == relation)
            .map(RelationState::active_keys)
            .unwrap_or_default()
    }

    /// The primary spec currently in effect.
    pub fn spec(&self) -> QuerySpec {
        self.engine.state.borrow().spec.clone()
    }

    pub fn filters(&self) -> Filters {
        self.engine.state.borrow().filters.clone()
    }

    /// True while a next/previous page query has not delivered yet.
    pub fn is_loading(&self) -> bool {
        self.engine.state.borrow().pending.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.state.borrow().disposed
    }

    /// True if the primary query failed and tore the view down.
    pub fn is_failed(&self) -> bool {
        self.engine.state.borrow().failed
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.engine.teardown();
    }
}

impl core::fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.engine.state.borrow();
        f.debug_struct("LiveSubscription")
            .field("collection", &self.engine.config.collection)
            .field("page", &state.pager.current())
            .field("disposed", &state.disposed)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Primary,
    Pending,
}

/// Child watches to close and open after a planning step.
struct Pass {
    closing: Vec<SubscriptionHandle>,
    opening: Vec<PendingOpen>,
}

struct EngineState {
    filters: Filters,
    /// Primary spec of page 1.
    spec: QuerySpec,
    /// Display order of the primary rows.
    order: SortOrder,
    primary: Option<PrimaryWatcher>,
    pending: Option<PrimaryWatcher>,
    /// Primary rows of the current page, in display order.
    visible: Vec<Document>,
    relations: Vec<RelationState>,
    pager: CursorPager,
    last: Option<Snapshot>,
    next_generation: u64,
    /// Nesting depth of reconciliation passes; child updates inside a pass
    /// fold into the pass's emission.
    pass_depth: usize,
    disposed: bool,
    failed: bool,
}

impl EngineState {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn slot_of(&self, generation: u64) -> Option<Slot> {
        if self.primary.as_ref().map(PrimaryWatcher::generation) == Some(generation) {
            Some(Slot::Primary)
        } else if self.pending.as_ref().map(PrimaryWatcher::generation) == Some(generation) {
            Some(Slot::Pending)
        } else {
            None
        }
    }

    /// Diffs every relation against the visible rows and reserves new slots.
    fn plan(&mut self) -> Pass {
        self.pass_depth += 1;
        let EngineState {
            relations,
            visible,
            next_generation,
            ..
        } = self;

        let mut closing = Vec::new();
        let mut opening = Vec::new();
        for (index, relation) in relations.iter_mut().enumerate() {
            let (closed, opened) = relation.plan(index, visible.as_slice(), &mut || {
                *next_generation += 1;
                *next_generation
            });
            closing.extend(closed);
            opening.extend(opened);
        }
        Pass { closing, opening }
    }

    /// Detaches every open handle and marks the graph disposed.
    fn detach_all(&mut self) -> Teardown {
        let mut teardown = Teardown::new();
        self.disposed = true;
        teardown.push_opt(self.primary.take().and_then(PrimaryWatcher::into_handle));
        teardown.push_opt(self.pending.take().and_then(PrimaryWatcher::into_handle));
        for relation in self.relations.iter_mut() {
            teardown.extend(relation.drain());
        }
        teardown
    }
}

struct Engine {
    transport: Rc<dyn Transport>,
    config: Rc<EngineConfig>,
    on_rows: Box<dyn Fn(&Snapshot)>,
    on_error: Box<dyn Fn(&Error)>,
    state: RefCell<EngineState>,
}

impl Engine {
    fn open_primary(self: &Rc<Self>, spec: QuerySpec, page: usize, reversed: bool, slot: Slot) {
        let generation = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            let generation = st.next_generation();
            let watcher = PrimaryWatcher::new(spec.clone(), generation, page, reversed);
            match slot {
                Slot::Primary => st.primary = Some(watcher),
                Slot::Pending => st.pending = Some(watcher),
            }
            generation
        };
        tracing::debug!(page, reversed, generation, "opening primary watch");

        let weak: Weak<Engine> = Rc::downgrade(self);
        let callback: WatchCallback = Rc::new(move |event: WatchEvent| {
            if let Some(engine) = weak.upgrade() {
                engine.on_primary(generation, event);
            }
        });
        let disposer = self.transport.watch(&spec, callback);
        let handle = SubscriptionHandle::new(format!("{}#{}", spec.collection(), page), disposer);

        let leftover = {
            let mut st = self.state.borrow_mut();
            match st.slot_of(generation) {
                Some(Slot::Primary) => st.primary.as_mut().and_then(|w| w.attach(handle)),
                Some(Slot::Pending) => st.pending.as_mut().and_then(|w| w.attach(handle)),
                None => Some(handle),
            }
        };
        if let Some(handle) = leftover {
            tracing::debug!(generation, "primary watch superseded before attach");
            handle.dispose_logged();
        }
    }

    fn on_primary(self: &Rc<Self>, generation: u64, event: WatchEvent) {
        let slot = {
            let st = self.state.borrow();
            if st.disposed {
                None
            } else {
                st.slot_of(generation)
            }
        };
        let slot = match slot {
            Some(slot) => slot,
            None => {
                tracing::debug!(generation, "discarding stale primary emission");
                return;
            }
        };

        match (slot, event) {
            (Slot::Primary, Ok(rows)) => self.apply_primary(rows),
            (Slot::Primary, Err(err)) => self.fail(err),
            (Slot::Pending, Ok(rows)) => self.commit_pending(rows),
            (Slot::Pending, Err(err)) => self.abort_pending(err),
        }
    }

    /// Stores the new primary rows and runs one reconciliation pass.
    fn apply_primary(self: &Rc<Self>, rows: Vec<Document>) {
        let pass = {
            let mut st = self.state.borrow_mut();
            let rows = match st.primary.as_ref() {
                Some(watcher) => watcher.normalize(rows, &st.order),
                None => return,
            };
            let bounds = PageBoundary::of(&rows, &st.order);
            st.pager.record(bounds);
            st.visible = rows;
            st.plan()
        };
        self.run_pass(pass);
    }

    /// The first page of a navigation arrived: swap it in for the primary.
    fn commit_pending(self: &Rc<Self>, rows: Vec<Document>) {
        let previous = {
            let mut st = self.state.borrow_mut();
            let pending = match st.pending.take() {
                Some(pending) => pending,
                None => return,
            };
            let page = pending.page();
            let previous = st.primary.replace(pending);
            st.pager.enter(page);
            tracing::debug!(page, "entered page");
            previous
        };
        if let Some(previous) = previous {
            previous.release();
        }
        self.apply_primary(rows);
    }

    fn abort_pending(self: &Rc<Self>, err: Error) {
        let pending = self.state.borrow_mut().pending.take();
        let page = pending.as_ref().map(PrimaryWatcher::page).unwrap_or(0);
        if let Some(pending) = pending {
            pending.release();
        }
        tracing::warn!(page, error = %err, "page query failed");
        (self.on_error)(&Error::pagination(page, err));
    }

    /// A primary error ends the view; the last snapshot stays readable.
    fn fail(self: &Rc<Self>, err: Error) {
        self.state.borrow_mut().failed = true;
        tracing::warn!(error = %err, "primary watch failed, tearing down");
        (self.on_error)(&err);
        self.teardown();
    }

    fn run_pass(self: &Rc<Self>, pass: Pass) {
        tracing::debug!(
            closing = pass.closing.len(),
            opening = pass.opening.len(),
            "reconciliation pass"
        );
        for handle in pass.closing {
            handle.dispose_logged();
        }
        for open in pass.opening {
            self.open_child(open);
        }
        self.state.borrow_mut().pass_depth -= 1;
        self.emit();
    }

    fn open_child(self: &Rc<Self>, open: PendingOpen) {
        if self.state.borrow().disposed {
            return;
        }
        let PendingOpen {
            relation,
            key,
            generation,
            spec,
        } = open;

        let weak: Weak<Engine> = Rc::downgrade(self);
        let callback_key = key.clone();
        let callback: WatchCallback = Rc::new(move |event: WatchEvent| {
            if let Some(engine) = weak.upgrade() {
                engine.on_child(relation, &callback_key, generation, event);
            }
        });
        let disposer = self.transport.watch(&spec, callback);
        let handle = SubscriptionHandle::new(key.as_str(), disposer);

        let leftover = {
            let mut st = self.state.borrow_mut();
            match st.relations.get_mut(relation) {
                Some(state) => state.attach(&key, generation, handle),
                None => Some(handle),
            }
        };
        if let Some(handle) = leftover {
            tracing::debug!(key = %key, "child watch superseded before attach");
            handle.dispose_logged();
        }
    }

    fn on_child(self: &Rc<Self>, relation: usize, key: &str, generation: u64, event: WatchEvent) {
        match event {
            Ok(docs) => {
                let emit_now = {
                    let mut st = self.state.borrow_mut();
                    if st.disposed {
                        return;
                    }
                    let accepted = st
                        .relations
                        .get_mut(relation)
                        .map(|state| state.accept(key, generation, docs))
                        .unwrap_or(false);
                    if !accepted {
                        tracing::debug!(key, generation, "discarding stale child emission");
                        return;
                    }
                    st.pass_depth == 0
                };
                if emit_now {
                    self.emit();
                }
            }
            Err(err) => {
                let current = {
                    let st = self.state.borrow();
                    !st.disposed
                        && st
                            .relations
                            .get(relation)
                            .map(|state| state.is_current(key, generation))
                            .unwrap_or(false)
                };
                if !current {
                    tracing::debug!(key, generation, "discarding stale child error");
                    return;
                }
                tracing::warn!(key, error = %err, "child watch failed, keeping cached value");
                (self.on_error)(&err);
            }
        }
    }

    /// Merges the visible rows with every relation and delivers the snapshot.
    fn emit(self: &Rc<Self>) {
        let snapshot = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            let merged = merge(&st.visible, &st.relations);
            let page = st.pager.current();
            let rows: Rc<[JoinedRow]> = match st.pager.cached(page) {
                Some(cached) if cached.as_ref() == merged.as_slice() => cached,
                _ => Rc::from(merged),
            };
            st.pager.store_rows(rows.clone());
            let bounds = st.pager.boundary(page).cloned().unwrap_or_default();
            let snapshot = Snapshot {
                rows,
                page,
                first: bounds.first,
                last: bounds.last,
                has_more: st.pager.has_more(),
            };
            st.last = Some(snapshot.clone());
            snapshot
        };
        (self.on_rows)(&snapshot);
    }

    fn go_next(self: &Rc<Self>) {
        let target = {
            let st = self.state.borrow();
            if st.disposed || st.pending.is_some() {
                None
            } else {
                st.pager
                    .next_target()
                    .map(|(page, cursor)| (page, st.spec.with_cursor(cursor)))
            }
        };
        match target {
            Some((page, spec)) => self.open_primary(spec, page, false, Slot::Pending),
            None => tracing::debug!("next page unavailable"),
        }
    }

    fn go_previous(self: &Rc<Self>) {
        let action = {
            let st = self.state.borrow();
            if st.disposed || st.pending.is_some() {
                PrevAction::Noop
            } else {
                st.pager.previous()
            }
        };
        match action {
            PrevAction::Noop => tracing::debug!("previous page unavailable"),
            PrevAction::Replay { page, rows } => self.replay(page, &rows),
            PrevAction::Requery { page, cursor } => {
                let spec = self.state.borrow().spec.reversed().with_cursor(cursor);
                self.open_primary(spec, page, true, Slot::Pending);
            }
            PrevAction::Reload { page, cursor } => {
                let spec = {
                    let st = self.state.borrow();
                    match cursor {
                        Some(cursor) => st.spec.with_cursor(cursor),
                        None => st.spec.clone(),
                    }
                };
                self.open_primary(spec, page, false, Slot::Pending);
            }
        }
    }

    /// Shows a cached page without querying the primary collection.
    ///
    /// The primary watch is released; child watches are reconciled against
    /// the cached records so joined values stay live. Reopened keys start
    /// from the cached joined values until their watch delivers.
    fn replay(self: &Rc<Self>, page: usize, rows: &[JoinedRow]) {
        let (previous, pass) = {
            let mut st = self.state.borrow_mut();
            let previous = st.primary.take();
            st.pager.enter(page);
            st.visible = rows.iter().map(|row| row.document.clone()).collect();
            let pass = st.plan();
            for state in st.relations.iter_mut() {
                for row in rows {
                    let relation = state.relation();
                    let seed = relation
                        .key_of(&row.document)
                        .zip(row.join(&relation.name).cloned());
                    if let Some((key, value)) = seed {
                        state.prime(&key, value);
                    }
                }
            }
            (previous, pass)
        };
        tracing::debug!(page, "replaying cached page");
        if let Some(previous) = previous {
            previous.release();
        }
        self.run_pass(pass);
    }

    fn set_filters(self: &Rc<Self>, filters: Filters) {
        let spec = self.config.spec_for(&filters);
        let reopen = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            st.filters = filters;
            if st.spec == spec {
                None
            } else {
                st.spec = spec.clone();
                st.order = sort_order_of(&spec);
                st.pager.reset(spec.limit());
                Some((st.primary.take(), st.pending.take()))
            }
        };

        match reopen {
            Some((primary, pending)) => {
                tracing::debug!("filters changed, reopening at page 1");
                for watcher in [primary, pending].into_iter().flatten() {
                    watcher.release();
                }
                self.open_primary(spec, 1, false, Slot::Primary);
            }
            None => tracing::debug!("filters unchanged"),
        }
    }

    fn teardown(&self) {
        let teardown = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return;
            }
            st.detach_all()
        };
        let total = teardown.len();
        let failures = teardown.dispose_all();
        tracing::debug!(total, failed = failures.len(), "live join disposed");
    }
}

fn sort_order_of(spec: &QuerySpec) -> SortOrder {
    spec.sort_order()
        .cloned()
        .unwrap_or_else(|| SortOrder::asc(DOCUMENT_ID_FIELD))
}
