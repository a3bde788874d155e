//! Document storage for one collection.

use alloc::string::String;
use alloc::vec::Vec;
use livejoin_core::{Document, Error, Result, Value};

/// Document map backend: HashMap (O(1) lookup) or BTreeMap (id order).
#[cfg(feature = "hash-store")]
type DocumentMap = hashbrown::HashMap<String, Document>;
#[cfg(not(feature = "hash-store"))]
type DocumentMap = alloc::collections::BTreeMap<String, Document>;

/// The documents of one named collection.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    name: String,
    documents: DocumentMap,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: DocumentMap::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Iterates over every document. Order depends on the backend.
    pub fn scan(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.values()
    }

    /// Inserts or replaces a document. Returns its new version.
    pub fn put(&mut self, mut doc: Document) -> Result<u64> {
        if doc.id().trim().is_empty() {
            return Err(Error::invalid_query("document id must not be blank"));
        }
        let version = self
            .documents
            .get(doc.id())
            .map(|existing| existing.version() + 1)
            .unwrap_or(1);
        doc.set_version(version);
        self.documents.insert(doc.id().into(), doc);
        Ok(version)
    }

    /// Sets fields on an existing document. Returns its new version.
    pub fn update<'a, I>(&mut self, id: &str, fields: I) -> Result<u64>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let doc = self
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(self.name.as_str(), id))?;
        for (name, value) in fields {
            doc.set(name, value);
        }
        Ok(doc.increment_version())
    }

    /// Removes a document.
    pub fn delete(&mut self, id: &str) -> Result<Document> {
        self.documents
            .remove(id)
            .ok_or_else(|| Error::not_found(self.name.as_str(), id))
    }

    /// Ids of every document, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.documents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}
