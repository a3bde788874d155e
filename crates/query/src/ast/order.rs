//! Sort order and pagination boundaries.
//!
//! Documents are ordered by the value of one sort field, with the document id
//! as tie-break. The tie-break follows the direction of the sort field, so the
//! reversed order is the exact mirror of the forward order and a boundary
//! taken in one order can resume a query in the other.

use alloc::string::String;
use core::cmp::Ordering;
use livejoin_core::{Document, DocumentId, Value};

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Ordering of a result set: one field and a direction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortOrder {
    pub field: String,
    pub direction: Direction,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }

    /// Returns the same field with the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.field.clone(), self.direction.flip())
    }

    /// Compares two documents under this order.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.compare_keys(
            &a.field_or_null(&self.field),
            a.id(),
            &b.field_or_null(&self.field),
            b.id(),
        )
    }

    /// Returns true if `doc` sorts strictly after `boundary` under this order.
    pub fn is_after(&self, doc: &Document, boundary: &Boundary) -> bool {
        self.compare_keys(&doc.field_or_null(&self.field), doc.id(), &boundary.key, &boundary.id)
            == Ordering::Greater
    }

    fn compare_keys(&self, a_key: &Value, a_id: &str, b_key: &Value, b_id: &str) -> Ordering {
        let cmp = a_key.cmp(b_key).then_with(|| a_id.cmp(b_id));
        match self.direction {
            Direction::Asc => cmp,
            Direction::Desc => cmp.reverse(),
        }
    }
}

/// A resume point for start-after pagination.
///
/// Holds the identity of a record and the value its sort field had when the
/// record was returned. Only meaningful for the sort field it was taken under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub id: DocumentId,
    pub key: Value,
}

impl Boundary {
    pub fn new(id: impl Into<DocumentId>, key: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }

    /// Takes a boundary from a document under the given order.
    pub fn of(doc: &Document, order: &SortOrder) -> Self {
        Self {
            id: doc.id().into(),
            key: doc.field_or_null(&order.field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn doc(id: &str, created: i64) -> Document {
        Document::new(id).with("createdAt", Value::Timestamp(created))
    }

    #[test]
    fn test_compare_desc() {
        let order = SortOrder::desc("createdAt");
        let mut docs = vec![doc("a", 1), doc("b", 3), doc("c", 2)];
        docs.sort_by(|a, b| order.compare(a, b));
        let ids: Vec<&str> = docs.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_tie_break_by_id_follows_direction() {
        let asc = SortOrder::asc("createdAt");
        let desc = SortOrder::desc("createdAt");
        let a = doc("a", 5);
        let b = doc("b", 5);
        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_missing_field_sorts_as_null() {
        let order = SortOrder::asc("createdAt");
        let bare = Document::new("x");
        assert_eq!(order.compare(&bare, &doc("a", 0)), Ordering::Less);
    }

    #[test]
    fn test_is_after() {
        let order = SortOrder::desc("createdAt");
        let boundary = Boundary::of(&doc("m", 10), &order);
        assert!(order.is_after(&doc("n", 9), &boundary));
        assert!(!order.is_after(&doc("n", 11), &boundary));
        assert!(!order.is_after(&doc("m", 10), &boundary));
        // same key, id tie-break in the sort direction
        assert!(order.is_after(&doc("a", 10), &boundary));
        assert!(!order.is_after(&doc("z", 10), &boundary));
    }

    #[test]
    fn test_reversed_mirrors_forward() {
        let forward = SortOrder::desc("createdAt");
        let backward = forward.reversed();
        assert_eq!(backward.direction, Direction::Asc);
        let a = doc("a", 1);
        let b = doc("b", 1);
        assert_eq!(forward.compare(&a, &b), backward.compare(&a, &b).reverse());
    }
}
