//! Livejoin Core - Document and value types for the livejoin engine.
//!
//! This crate provides the foundational types shared by every livejoin crate:
//!
//! - `Value`: Field values stored in a document (null, boolean, integer, float,
//!   string, timestamp, array)
//! - `Document`: A record with an opaque string identity and a bag of named fields
//! - `Error`: Error types for transport, query and reconciliation failures
//!
//! # Example
//!
//! ```rust
//! use livejoin_core::{Document, Value, DOCUMENT_ID_FIELD};
//!
//! let zone = Document::new("z1")
//!     .with("zone_name", "Harbour")
//!     .with("company_Id", "c1")
//!     .with("status", 1i64);
//!
//! assert_eq!(zone.id(), "z1");
//! assert_eq!(zone.get("status"), Some(&Value::Int64(1)));
//! assert_eq!(zone.field(DOCUMENT_ID_FIELD), Some(Value::String("z1".into())));
//! ```

#![no_std]

extern crate alloc;

mod document;
mod error;
mod value;

pub use document::{Document, DocumentId, DOCUMENT_ID_FIELD};
pub use error::{Error, Result};
pub use value::Value;
