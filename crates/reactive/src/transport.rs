//! Transport abstraction consumed by the engine.
//!
//! A transport is the document store's live query layer. The engine never
//! talks to a store directly; it opens watches through this trait and
//! receives every result set through a callback.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use livejoin_core::{Document, Result};
use livejoin_query::QuerySpec;

/// One delivery from a live query: the complete ordered result, or a failure.
pub type WatchEvent = Result<Vec<Document>>;

/// Callback invoked by a transport on every change of a watched query.
pub type WatchCallback = Rc<dyn Fn(WatchEvent)>;

/// Releases a watch. May fail; callers log and continue.
pub type Disposer = Box<dyn FnOnce() -> Result<()>>;

/// The live query layer of a document store.
///
/// Implementations may deliver the first result synchronously from inside
/// `watch`, and must stop invoking the callback once the returned disposer
/// has run.
pub trait Transport {
    /// Opens a live query and returns its disposer.
    ///
    /// Invalid specifications are reported through the callback, not here.
    fn watch(&self, spec: &QuerySpec, callback: WatchCallback) -> Disposer;

    /// Reads one document by id.
    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;
}
