//! Join fan-out.
//!
//! A `Relation` describes a child collection joined onto each primary record
//! by a foreign key. `RelationState` keeps exactly one child watch open per
//! distinct key present in the visible primary set, and one cached child value
//! per open key.
//!
//! Reconciliation is split so the transport is never called while engine
//! state is borrowed: `plan` computes the diff, removes stale slots and
//! reserves new ones; the caller disposes and opens watches afterwards and
//! hands the resulting handles back through `attach`.

use crate::handle::SubscriptionHandle;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use livejoin_core::{Document, DOCUMENT_ID_FIELD};
use livejoin_query::{Predicate, QuerySpec};

/// What a relation attaches to each primary record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Number of matching children.
    Count,
    /// All matching children.
    Rows,
    /// The first matching child, if any.
    Lookup,
}

/// Cached child result for one foreign key.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildValue {
    Count(usize),
    Rows(Vec<Document>),
    Lookup(Option<Document>),
}

impl ChildValue {
    /// Value attached before a key's first child emission.
    pub fn absent(kind: RelationKind) -> Self {
        match kind {
            RelationKind::Count => ChildValue::Count(0),
            RelationKind::Rows => ChildValue::Rows(Vec::new()),
            RelationKind::Lookup => ChildValue::Lookup(None),
        }
    }

    /// Derives the cached value from a child result set.
    pub fn derive(kind: RelationKind, mut docs: Vec<Document>) -> Self {
        match kind {
            RelationKind::Count => ChildValue::Count(docs.len()),
            RelationKind::Rows => ChildValue::Rows(docs),
            RelationKind::Lookup => {
                if docs.is_empty() {
                    ChildValue::Lookup(None)
                } else {
                    ChildValue::Lookup(Some(docs.swap_remove(0)))
                }
            }
        }
    }

    /// Number of children this value represents.
    pub fn len(&self) -> usize {
        match self {
            ChildValue::Count(n) => *n,
            ChildValue::Rows(rows) => rows.len(),
            ChildValue::Lookup(doc) => usize::from(doc.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the child rows for a `Rows` value.
    pub fn rows(&self) -> Option<&[Document]> {
        match self {
            ChildValue::Rows(rows) => Some(rows.as_slice()),
            _ => None,
        }
    }

    /// Returns the looked-up document for a `Lookup` value.
    pub fn document(&self) -> Option<&Document> {
        match self {
            ChildValue::Lookup(doc) => doc.as_ref(),
            _ => None,
        }
    }
}

/// A child collection joined by foreign key.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    /// Name under which the child value is attached to merged rows.
    pub name: String,
    /// Child collection.
    pub child_collection: String,
    /// Child field compared against the key.
    pub child_field: String,
    /// Parent field holding the key.
    pub parent_field: String,
    pub kind: RelationKind,
    /// Extra filters on the child query.
    pub filters: Vec<Predicate>,
}

impl Relation {
    fn new(
        name: impl Into<String>,
        child_collection: impl Into<String>,
        child_field: impl Into<String>,
        parent_field: impl Into<String>,
        kind: RelationKind,
    ) -> Self {
        Self {
            name: name.into(),
            child_collection: child_collection.into(),
            child_field: child_field.into(),
            parent_field: parent_field.into(),
            kind,
            filters: Vec::new(),
        }
    }

    /// Counts children whose `child_field` equals the parent's id.
    pub fn count(
        name: impl Into<String>,
        child_collection: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self::new(name, child_collection, child_field, DOCUMENT_ID_FIELD, RelationKind::Count)
    }

    /// Attaches children whose `child_field` equals the parent's id.
    pub fn rows(
        name: impl Into<String>,
        child_collection: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self::new(name, child_collection, child_field, DOCUMENT_ID_FIELD, RelationKind::Rows)
    }

    /// Attaches the child document whose id is the parent's `parent_field`.
    pub fn lookup(
        name: impl Into<String>,
        child_collection: impl Into<String>,
        parent_field: impl Into<String>,
    ) -> Self {
        Self::new(name, child_collection, DOCUMENT_ID_FIELD, parent_field, RelationKind::Lookup)
    }

    /// Reads the key from a parent field other than its id.
    pub fn parent_field(mut self, field: impl Into<String>) -> Self {
        self.parent_field = field.into();
        self
    }

    /// Adds a filter to every child query of this relation.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Returns the foreign key of a parent, if it has a usable one.
    pub fn key_of(&self, parent: &Document) -> Option<String> {
        parent
            .field(&self.parent_field)
            .and_then(|v| v.as_key().map(ToString::to_string))
    }

    /// Distinct keys across `rows`, in first-seen order.
    pub fn needed_keys(&self, rows: &[Document]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for row in rows {
            if let Some(key) = self.key_of(row) {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// The child query for one key.
    pub fn child_spec(&self, key: &str) -> QuerySpec {
        let mut spec = QuerySpec::new(self.child_collection.as_str())
            .with(Predicate::eq(self.child_field.as_str(), key));
        for predicate in &self.filters {
            spec.push(predicate.clone());
        }
        if self.kind == RelationKind::Lookup && self.child_field == DOCUMENT_ID_FIELD {
            spec.push(Predicate::limit(1));
        }
        spec
    }
}

/// Keys to open and to close for one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub to_open: Vec<String>,
    pub to_close: Vec<String>,
}

impl KeyDiff {
    pub fn is_empty(&self) -> bool {
        self.to_open.is_empty() && self.to_close.is_empty()
    }
}

/// Computes which keys appeared and which disappeared.
///
/// `to_close` keeps the order of `active`, `to_open` the order of `needed`.
pub fn diff(active: &[String], needed: &[String]) -> KeyDiff {
    let active_set: HashSet<&str> = active.iter().map(String::as_str).collect();
    let needed_set: HashSet<&str> = needed.iter().map(String::as_str).collect();

    KeyDiff {
        to_open: needed
            .iter()
            .filter(|k| !active_set.contains(k.as_str()))
            .cloned()
            .collect(),
        to_close: active
            .iter()
            .filter(|k| !needed_set.contains(k.as_str()))
            .cloned()
            .collect(),
    }
}

/// Lifecycle phase of a child slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotPhase {
    /// Key is needed; the watch is being opened.
    Idle,
    /// The watch is open and its handle is held.
    Watching,
}

/// Per-key state: phase, generation token, cache and handle.
#[derive(Debug)]
pub struct ChildSlot {
    phase: SlotPhase,
    generation: u64,
    cache: Option<ChildValue>,
    handle: Option<SubscriptionHandle>,
}

impl ChildSlot {
    fn reserve(generation: u64) -> Self {
        Self {
            phase: SlotPhase::Idle,
            generation,
            cache: None,
            handle: None,
        }
    }

    #[inline]
    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn cache(&self) -> Option<&ChildValue> {
        self.cache.as_ref()
    }
}

/// A child watch the caller must open after `plan`.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingOpen {
    pub relation: usize,
    pub key: String,
    pub generation: u64,
    pub spec: QuerySpec,
}

/// Key -> slot map for one relation.
#[derive(Debug)]
pub struct RelationState {
    relation: Relation,
    slots: HashMap<String, ChildSlot>,
}

impl RelationState {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            slots: HashMap::new(),
        }
    }

    #[inline]
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Returns the active keys, sorted.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of keys with a slot.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, key: &str) -> Option<&ChildSlot> {
        self.slots.get(key)
    }

    /// Plans one reconciliation pass against `rows`.
    ///
    /// Stale slots are removed and their handles returned for disposal; new
    /// slots are reserved in `Idle` with a fresh generation from `next_gen`.
    pub fn plan(
        &mut self,
        index: usize,
        rows: &[Document],
        next_gen: &mut dyn FnMut() -> u64,
    ) -> (Vec<SubscriptionHandle>, Vec<PendingOpen>) {
        let active = self.active_keys();
        let needed = self.relation.needed_keys(rows);
        let KeyDiff { to_open, to_close } = diff(&active, &needed);

        let mut closing = Vec::with_capacity(to_close.len());
        for key in to_close {
            if let Some(slot) = self.slots.remove(&key) {
                if let Some(handle) = slot.handle {
                    closing.push(handle);
                }
            }
        }

        let mut opening = Vec::with_capacity(to_open.len());
        for key in to_open {
            let generation = next_gen();
            let spec = self.relation.child_spec(&key);
            self.slots.insert(key.clone(), ChildSlot::reserve(generation));
            opening.push(PendingOpen {
                relation: index,
                key,
                generation,
                spec,
            });
        }

        (closing, opening)
    }

    /// Moves an opened watch's handle into its slot.
    ///
    /// Returns the handle back if the slot was closed or re-reserved in the
    /// meantime; the caller must dispose it.
    pub fn attach(
        &mut self,
        key: &str,
        generation: u64,
        handle: SubscriptionHandle,
    ) -> Option<SubscriptionHandle> {
        match self.slots.get_mut(key) {
            Some(slot) if slot.generation == generation && slot.handle.is_none() => {
                slot.handle = Some(handle);
                slot.phase = SlotPhase::Watching;
                None
            }
            _ => Some(handle),
        }
    }

    /// Applies a child emission. Returns false if the emission is stale.
    pub fn accept(&mut self, key: &str, generation: u64, docs: Vec<Document>) -> bool {
        let kind = self.relation.kind;
        match self.slots.get_mut(key) {
            Some(slot) if slot.generation == generation => {
                slot.cache = Some(ChildValue::derive(kind, docs));
                true
            }
            _ => false,
        }
    }

    /// Seeds a slot that has not received a child emission yet.
    ///
    /// Slots with a delivered value are left alone, so a live emission always
    /// wins over a seeded one. Returns false if nothing was seeded.
    pub fn prime(&mut self, key: &str, value: ChildValue) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) if slot.cache.is_none() => {
                slot.cache = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Returns true if `generation` is the live watch for `key`.
    pub fn is_current(&self, key: &str, generation: u64) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.generation == generation)
            .unwrap_or(false)
    }

    /// The value to attach to `parent`: its key's cache, or the absent default.
    pub fn value_for(&self, parent: &Document) -> ChildValue {
        self.relation
            .key_of(parent)
            .and_then(|key| self.slots.get(&key))
            .and_then(|slot| slot.cache.clone())
            .unwrap_or_else(|| ChildValue::absent(self.relation.kind))
    }

    /// Removes every slot and returns the open handles.
    pub fn drain(&mut self) -> Vec<SubscriptionHandle> {
        let keys = self.active_keys();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(slot) = self.slots.remove(&key) {
                if let Some(handle) = slot.handle {
                    handles.push(handle);
                }
            }
        }
        handles
    }
}
