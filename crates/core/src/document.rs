//! Document structure for livejoin collections.
//!
//! This module defines the `Document` struct which represents a single record
//! in a collection of the document store.

use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Opaque identity of a document, unique within its collection.
pub type DocumentId = String;

/// Pseudo-field that resolves to the document identity.
///
/// Predicates and relations may name this field to address a document by id.
pub const DOCUMENT_ID_FIELD: &str = "__id__";

/// A document in a collection.
#[derive(Clone, Debug)]
pub struct Document {
    /// Identity of this document.
    id: DocumentId,
    /// Version number for change detection. Incremented on each write.
    version: u64,
    /// Named fields.
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document with the given id.
    /// Version defaults to 1 for new documents.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a document from an id and a field map.
    pub fn with_fields(id: impl Into<DocumentId>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            fields,
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Returns the document id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Sets the version number.
    #[inline]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Gets a stored field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Resolves a field by name, including the `__id__` pseudo-field.
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == DOCUMENT_ID_FIELD {
            Some(Value::String(self.id.clone()))
        } else {
            self.fields.get(name).cloned()
        }
    }

    /// Resolves a field by name, yielding Null when absent.
    pub fn field_or_null(&self, name: &str) -> Value {
        self.field(name).unwrap_or(Value::Null)
    }

    /// Sets a field, returning the previous value if any.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.to_string(), value.into())
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns the stored fields.
    #[inline]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns the number of stored fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if this document has no stored fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fields == other.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new() {
        let doc = Document::new("a1").with("agent_name", "Ada").with("status", 1i64);
        assert_eq!(doc.id(), "a1");
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_document_field_resolution() {
        let doc = Document::new("c1").with("company_name", "Acme");
        assert_eq!(doc.field(DOCUMENT_ID_FIELD), Some(Value::from("c1")));
        assert_eq!(doc.field("company_name"), Some(Value::from("Acme")));
        assert_eq!(doc.field("missing"), None);
        assert_eq!(doc.field_or_null("missing"), Value::Null);
        assert_eq!(doc.get(DOCUMENT_ID_FIELD), None);
    }

    #[test]
    fn test_document_set_remove() {
        let mut doc = Document::new("z1");
        assert_eq!(doc.set("status", 1i64), None);
        assert_eq!(doc.set("status", 2i64), Some(Value::Int64(1)));
        assert_eq!(doc.remove("status"), Some(Value::Int64(2)));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_document_equality_ignores_version() {
        let mut a = Document::new("z1").with("status", 1i64);
        let b = Document::new("z1").with("status", 1i64);
        a.increment_version();
        assert_eq!(a, b);
        assert_ne!(a, Document::new("z2").with("status", 1i64));
    }
}
