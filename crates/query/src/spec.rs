//! Query specifications.
//!
//! A `QuerySpec` is the ordered predicate list a transport subscribes with.
//! Two specs are the same query iff they compare equal by value.

use crate::ast::{Boundary, Predicate, SortOrder};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use livejoin_core::{Document, Error, Result};

/// An ordered list of predicates against one collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QuerySpec {
    collection: String,
    predicates: Vec<Predicate>,
}

impl QuerySpec {
    /// Creates a spec with no predicates.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicates: Vec::new(),
        }
    }

    /// Appends a predicate.
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Appends a predicate in place.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the filter predicates in order.
    pub fn filters(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|p| p.is_filter())
    }

    /// Returns the first ordering, if any.
    pub fn sort_order(&self) -> Option<&SortOrder> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::OrderBy(order) => Some(order),
            _ => None,
        })
    }

    /// Returns the last limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.predicates.iter().rev().find_map(|p| match p {
            Predicate::Limit(n) => Some(*n),
            _ => None,
        })
    }

    /// Returns the pagination cursor, if any.
    pub fn cursor(&self) -> Option<&Boundary> {
        self.predicates.iter().rev().find_map(|p| match p {
            Predicate::StartAfter(b) => Some(b),
            _ => None,
        })
    }

    /// Returns a copy with the cursor replaced by `boundary` (appended last).
    pub fn with_cursor(&self, boundary: Boundary) -> Self {
        let mut spec = self.without_cursor();
        spec.predicates.push(Predicate::StartAfter(boundary));
        spec
    }

    /// Returns a copy with every cursor removed.
    pub fn without_cursor(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            predicates: self
                .predicates
                .iter()
                .filter(|p| !matches!(p, Predicate::StartAfter(_)))
                .cloned()
                .collect(),
        }
    }

    /// Returns the reverse-order equivalent: every ordering flipped.
    ///
    /// With a cursor, this walks backwards from the boundary.
    pub fn reversed(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            predicates: self
                .predicates
                .iter()
                .map(|p| match p {
                    Predicate::OrderBy(order) => Predicate::OrderBy(order.reversed()),
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Returns true if the document satisfies every filter predicate.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters().all(|p| p.matches(doc))
    }

    /// Checks the single-range-field rule: every inequality must target the
    /// same field, and that field must be the first ordering.
    pub fn validate(&self) -> Result<()> {
        let mut range_field: Option<&str> = None;
        for p in self.predicates.iter().filter(|p| p.is_range()) {
            let field = p.field().unwrap_or_default();
            match range_field {
                None => range_field = Some(field),
                Some(existing) if existing != field => {
                    return Err(Error::invalid_query(format!(
                        "inequality filters on different fields: {} and {}",
                        existing, field
                    )));
                }
                Some(_) => {}
            }
        }

        if let (Some(range), Some(order)) = (range_field, self.sort_order()) {
            if order.field != range {
                return Err(Error::invalid_query(format!(
                    "first ordering must be on the inequality field {}, found {}",
                    range, order.field
                )));
            }
        }

        if self.limit() == Some(0) {
            return Err(Error::invalid_query("limit must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Direction;

    fn base() -> QuerySpec {
        QuerySpec::new("zones")
            .with(Predicate::eq("company_Id", "c1"))
            .with(Predicate::order_by("createdAt", Direction::Desc))
            .with(Predicate::limit(10))
    }

    #[test]
    fn test_accessors() {
        let spec = base();
        assert_eq!(spec.collection(), "zones");
        assert_eq!(spec.filters().count(), 1);
        assert_eq!(spec.sort_order(), Some(&SortOrder::desc("createdAt")));
        assert_eq!(spec.limit(), Some(10));
        assert_eq!(spec.cursor(), None);
    }

    #[test]
    fn test_with_cursor_replaces_and_appends_last() {
        let spec = base().with_cursor(Boundary::new("z1", 1i64));
        let spec = spec.with_cursor(Boundary::new("z2", 2i64));
        assert_eq!(spec.cursor(), Some(&Boundary::new("z2", 2i64)));
        assert_eq!(
            spec.predicates().iter().filter(|p| matches!(p, Predicate::StartAfter(_))).count(),
            1
        );
        assert!(matches!(spec.predicates().last(), Some(Predicate::StartAfter(_))));
        assert_eq!(spec.without_cursor(), base());
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(base(), base());
        assert_ne!(base(), base().with(Predicate::eq("status", 1i64)));
    }

    #[test]
    fn test_reversed() {
        let spec = base().reversed();
        assert_eq!(spec.sort_order(), Some(&SortOrder::asc("createdAt")));
        assert_eq!(spec.reversed(), base());
    }

    #[test]
    fn test_validate_single_range_field() {
        let ok = QuerySpec::new("zones")
            .with(Predicate::ge("zone_name_lc", "h"))
            .with(Predicate::lt("zone_name_lc", "h\u{f8ff}"))
            .with(Predicate::order_by("zone_name_lc", Direction::Asc));
        assert!(ok.validate().is_ok());

        let two_fields = QuerySpec::new("zones")
            .with(Predicate::ge("zone_name_lc", "h"))
            .with(Predicate::lt("address", "x"));
        assert!(matches!(two_fields.validate(), Err(Error::InvalidQuery { .. })));

        let wrong_order = QuerySpec::new("zones")
            .with(Predicate::ge("zone_name_lc", "h"))
            .with(Predicate::order_by("createdAt", Direction::Desc));
        assert!(matches!(wrong_order.validate(), Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_validate_zero_limit() {
        let spec = QuerySpec::new("zones").with(Predicate::limit(0));
        assert!(spec.validate().is_err());
    }
}
