//! Predicate definitions for query specifications.

use crate::ast::order::{Boundary, Direction, SortOrder};
use alloc::string::String;
use alloc::vec::Vec;
use livejoin_core::{Document, Value};

/// One entry of a query specification.
///
/// Filter predicates (`Eq`, `In`, `ArrayContains`, `Ge`, `Lt`) restrict the
/// result set; `OrderBy`, `Limit` and `StartAfter` shape it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field` is one of `values`
    In { field: String, values: Vec<Value> },
    /// `field` is an array holding `value`
    ArrayContains { field: String, value: Value },
    /// `field >= value`
    Ge { field: String, value: Value },
    /// `field < value`
    Lt { field: String, value: Value },
    /// Result ordering
    OrderBy(SortOrder),
    /// Maximum number of results
    Limit(usize),
    /// Resume strictly after a boundary record
    StartAfter(Boundary),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        Predicate::OrderBy(SortOrder::new(field, direction))
    }

    pub fn limit(n: usize) -> Self {
        Predicate::Limit(n)
    }

    pub fn start_after(boundary: Boundary) -> Self {
        Predicate::StartAfter(boundary)
    }

    /// Returns true for predicates that restrict which documents match.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            Predicate::Eq { .. }
                | Predicate::In { .. }
                | Predicate::ArrayContains { .. }
                | Predicate::Ge { .. }
                | Predicate::Lt { .. }
        )
    }

    /// Returns true for inequality predicates.
    pub fn is_range(&self) -> bool {
        matches!(self, Predicate::Ge { .. } | Predicate::Lt { .. })
    }

    /// Returns the field a filter or ordering targets.
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::In { field, .. }
            | Predicate::ArrayContains { field, .. }
            | Predicate::Ge { field, .. }
            | Predicate::Lt { field, .. } => Some(field.as_str()),
            Predicate::OrderBy(order) => Some(order.field.as_str()),
            Predicate::Limit(_) | Predicate::StartAfter(_) => None,
        }
    }

    /// Evaluates a filter predicate against a document.
    ///
    /// Shaping predicates always match. A missing field never satisfies a filter.
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.is_filter() {
            return true;
        }
        let field = match self.field().and_then(|f| doc.field(f)) {
            Some(v) => v,
            None => return false,
        };

        match self {
            Predicate::Eq { value, .. } => &field == value,
            Predicate::In { values, .. } => values.iter().any(|v| v == &field),
            Predicate::ArrayContains { value, .. } => field.array_contains(value),
            Predicate::Ge { value, .. } => &field >= value,
            Predicate::Lt { value, .. } => &field < value,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use livejoin_core::DOCUMENT_ID_FIELD;

    fn agent() -> Document {
        Document::new("a1")
            .with("company_Id", "c1")
            .with("status", 1i64)
            .with("agent_name", "Ada")
            .with("zone", Value::Array(vec!["z1".into(), "z2".into()]))
    }

    #[test]
    fn test_eq() {
        assert!(Predicate::eq("company_Id", "c1").matches(&agent()));
        assert!(!Predicate::eq("company_Id", "c2").matches(&agent()));
        assert!(!Predicate::eq("missing", Value::Null).matches(&agent()));
    }

    #[test]
    fn test_eq_on_id() {
        assert!(Predicate::eq(DOCUMENT_ID_FIELD, "a1").matches(&agent()));
    }

    #[test]
    fn test_in() {
        let p = Predicate::in_list("status", vec![Value::Int64(1), Value::Int64(2)]);
        assert!(p.matches(&agent()));
        let p = Predicate::in_list("status", vec![Value::Int64(3)]);
        assert!(!p.matches(&agent()));
    }

    #[test]
    fn test_array_contains() {
        assert!(Predicate::array_contains("zone", "z2").matches(&agent()));
        assert!(!Predicate::array_contains("zone", "z9").matches(&agent()));
    }

    #[test]
    fn test_range() {
        assert!(Predicate::ge("agent_name", "Ad").matches(&agent()));
        assert!(Predicate::lt("agent_name", "Ad\u{f8ff}").matches(&agent()));
        assert!(!Predicate::ge("agent_name", "B").matches(&agent()));
        assert!(Predicate::ge("agent_name", "B").is_range());
    }

    #[test]
    fn test_shaping_predicates_match_everything() {
        assert!(Predicate::limit(1).matches(&agent()));
        assert!(Predicate::order_by("x", Direction::Asc).matches(&agent()));
        assert!(!Predicate::limit(1).is_filter());
        assert_eq!(Predicate::limit(1).field(), None);
    }
}
