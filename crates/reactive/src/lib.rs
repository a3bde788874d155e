//! Livejoin Reactive - Live joined views over a document store.
//!
//! This crate keeps a paginated, filtered list of primary records live, and
//! joins related child data onto every visible record. Child subscriptions
//! are opened and closed as foreign keys enter and leave the visible page.
//!
//! # Core Concepts
//!
//! - `Transport`: The store's live query layer, injected by the caller
//! - `Relation`: A child collection joined by foreign key (count, rows or lookup)
//! - `LiveJoin`: Configured entry point, one per primary collection
//! - `LiveSubscription`: One live view with its own join graph and pager
//! - `Snapshot`: Merged rows delivered on every change
//!
//! # Key Features
//!
//! - One child watch per distinct foreign key, reconciled on every primary change
//! - Stale child watches are disposed before new ones are opened
//! - Cursor pagination with cached back navigation
//! - One-call teardown of the whole join graph
//!
//! # Example
//!
//! ```ignore
//! use livejoin_query::Filters;
//! use livejoin_reactive::{LiveJoin, Relation};
//! use livejoin_storage::MemoryStore;
//! use std::rc::Rc;
//!
//! let store = Rc::new(MemoryStore::new());
//! let join = LiveJoin::builder("companies")
//!     .relation(Relation::count("agentCount", "agents", "company_Id"))
//!     .relation(Relation::count("zoneCount", "zones", "company_Id"))
//!     .page_size(25)
//!     .build(store.clone());
//!
//! let view = join.subscribe(
//!     Filters::new().status(1i64),
//!     |snapshot| println!("page {}: {} companies", snapshot.page, snapshot.len()),
//!     |err| eprintln!("{}", err),
//! );
//!
//! view.go_next();
//! view.go_previous();
//! view.dispose();
//! ```

#![no_std]

extern crate alloc;

pub mod engine;
pub mod fanout;
pub mod handle;
pub mod merge;
pub mod pager;
pub mod transport;
pub mod watcher;

pub use engine::{EngineConfig, LiveJoin, LiveJoinBuilder, LiveSubscription};
pub use fanout::{
    diff, ChildSlot, ChildValue, KeyDiff, Relation, RelationKind, RelationState, SlotPhase,
};
pub use handle::{SubscriptionHandle, Teardown};
pub use merge::{merge, JoinedRow, Snapshot};
pub use pager::{CursorPager, PageBoundary, PrevAction};
pub use transport::{Disposer, Transport, WatchCallback, WatchEvent};
pub use watcher::PrimaryWatcher;

// Re-export commonly used types from dependencies
pub use livejoin_core::{Document, Error, Result, Value};
pub use livejoin_query::{Boundary, FieldMap, Filters, Predicate, QuerySpec};
