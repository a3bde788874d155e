//! Livejoin Storage - In-memory live document store for livejoin.
//!
//! This crate provides a document store that serves live queries through the
//! `livejoin_reactive::Transport` trait:
//!
//! - `Collection`: Documents of one named collection, with versioning
//! - `MemoryStore`: Collections plus live watchers re-evaluated after each write
//! - Fault injection (failing watches, failing disposers) for exercising error paths
//!
//! # Example
//!
//! ```rust
//! use livejoin_core::Document;
//! use livejoin_query::{Predicate, QuerySpec};
//! use livejoin_reactive::{Transport, WatchCallback};
//! use livejoin_storage::MemoryStore;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let store = MemoryStore::new();
//! store.put("agents", Document::new("a1").with("company_Id", "c1")).unwrap();
//!
//! let seen = Rc::new(Cell::new(0));
//! let seen_clone = seen.clone();
//! let callback: WatchCallback = Rc::new(move |event| {
//!     seen_clone.set(event.map(|rows| rows.len()).unwrap_or(0));
//! });
//!
//! let spec = QuerySpec::new("agents").with(Predicate::eq("company_Id", "c1"));
//! let disposer = store.watch(&spec, callback);
//! assert_eq!(seen.get(), 1);
//!
//! store.put("agents", Document::new("a2").with("company_Id", "c1")).unwrap();
//! assert_eq!(seen.get(), 2);
//!
//! disposer().unwrap();
//! assert_eq!(store.active_watchers("agents"), 0);
//! ```

#![no_std]

extern crate alloc;

pub mod collection;
pub mod store;

pub use collection::Collection;
pub use store::{MemoryStore, WatchId, WatchStats};
