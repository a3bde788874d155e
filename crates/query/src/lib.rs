//! Livejoin Query - Query specifications for the livejoin engine.
//!
//! This crate turns caller filters into ordered predicate lists and evaluates
//! those lists against documents:
//!
//! - `ast`: Predicate, sort order and boundary definitions
//! - `spec`: `QuerySpec`, the ordered predicate list handed to a transport
//! - `builder`: `Filters` + `FieldMap` -> `QuerySpec`
//! - `executor`: Evaluates a `QuerySpec` over a set of documents
//!
//! # Example
//!
//! ```rust
//! use livejoin_query::{build_spec, FieldMap, Filters, Predicate};
//!
//! let filters = Filters::new().scope("c1").status(1i64).limit(25);
//! let spec = build_spec("zones", &FieldMap::default(), &filters);
//!
//! assert_eq!(spec.limit(), Some(25));
//! assert!(matches!(spec.predicates()[0], Predicate::Eq { .. }));
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod builder;
pub mod executor;
pub mod spec;

pub use ast::{Boundary, Direction, Predicate, SortOrder};
pub use builder::{build_spec, FieldMap, Filters, SEARCH_SENTINEL};
pub use executor::execute;
pub use spec::QuerySpec;
