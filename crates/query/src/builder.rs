//! Query specification builder.
//!
//! Turns caller filters into the ordered predicate list of a primary query.
//! The builder is pure and performs no validation; a spec the store cannot
//! serve is rejected by the transport when it is watched.

use crate::ast::{Boundary, Direction, Predicate};
use crate::spec::QuerySpec;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use livejoin_core::Value;

/// Upper sentinel appended to a search term to form a prefix range.
pub const SEARCH_SENTINEL: char = '\u{f8ff}';

/// Store field names targeted by each filter.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMap {
    /// Field restricted by `Filters::scope_id`.
    pub scope_field: String,
    /// Field restricted by `Filters::status`.
    pub status_field: String,
    /// Field restricted by `Filters::category`.
    pub category_field: String,
    /// Field matched and ordered by a search term.
    pub search_field: String,
    /// Creation time field, the default ordering (descending).
    pub created_field: String,
    /// Lower-case the search term before matching.
    pub lowercase_search: bool,
    /// Additional filters appended after the equality constraints.
    pub extra: Vec<Predicate>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            scope_field: "company_Id".into(),
            status_field: "status".into(),
            category_field: "category".into(),
            search_field: "name_lc".into(),
            created_field: "createdAt".into(),
            lowercase_search: true,
            extra: Vec::new(),
        }
    }
}

impl FieldMap {
    pub fn scope_field(mut self, field: impl Into<String>) -> Self {
        self.scope_field = field.into();
        self
    }

    pub fn status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = field.into();
        self
    }

    pub fn category_field(mut self, field: impl Into<String>) -> Self {
        self.category_field = field.into();
        self
    }

    /// Sets the search field and whether terms are lower-cased.
    pub fn search_field(mut self, field: impl Into<String>, lowercase: bool) -> Self {
        self.search_field = field.into();
        self.lowercase_search = lowercase;
        self
    }

    pub fn created_field(mut self, field: impl Into<String>) -> Self {
        self.created_field = field.into();
        self
    }

    /// Adds a filter applied to every query built with this map.
    pub fn extra(mut self, predicate: Predicate) -> Self {
        self.extra.push(predicate);
        self
    }
}

/// Caller filter parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filters {
    /// Restrict to children of one scope (e.g. a company).
    pub scope_id: Option<String>,
    /// Equality filter on the status field.
    pub status: Option<Value>,
    /// Equality filter on the category field.
    pub category: Option<Value>,
    /// Free-text prefix search; switches the ordering to the search field.
    pub search: Option<String>,
    /// Page size. Unset disables pagination.
    pub limit: Option<usize>,
    /// Resume after a prior page boundary.
    pub cursor: Option<Boundary>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn category(mut self, category: impl Into<Value>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, boundary: Boundary) -> Self {
        self.cursor = Some(boundary);
        self
    }

    /// Returns the normalized search term, or None if absent or blank.
    pub fn search_term(&self, lowercase: bool) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            None
        } else if lowercase {
            Some(term.to_lowercase())
        } else {
            Some(term.to_string())
        }
    }
}

/// Builds the primary query specification for `filters`.
///
/// Order: equality constraints, extra filters, then either the search prefix
/// range ordered by the search field or the default descending creation-time
/// ordering, then the limit, then the cursor.
pub fn build_spec(collection: &str, fields: &FieldMap, filters: &Filters) -> QuerySpec {
    let mut spec = QuerySpec::new(collection);

    if let Some(scope) = filters.scope_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        spec.push(Predicate::eq(fields.scope_field.as_str(), scope));
    }
    if let Some(status) = &filters.status {
        spec.push(Predicate::eq(fields.status_field.as_str(), status.clone()));
    }
    if let Some(category) = &filters.category {
        spec.push(Predicate::eq(fields.category_field.as_str(), category.clone()));
    }
    for predicate in &fields.extra {
        spec.push(predicate.clone());
    }

    match filters.search_term(fields.lowercase_search) {
        Some(term) => {
            let mut upper = term.clone();
            upper.push(SEARCH_SENTINEL);
            spec.push(Predicate::ge(fields.search_field.as_str(), term));
            spec.push(Predicate::lt(fields.search_field.as_str(), upper));
            spec.push(Predicate::order_by(fields.search_field.as_str(), Direction::Asc));
        }
        None => {
            spec.push(Predicate::order_by(fields.created_field.as_str(), Direction::Desc));
        }
    }

    if let Some(limit) = filters.limit {
        spec.push(Predicate::limit(limit));
    }
    if let Some(cursor) = &filters.cursor {
        spec.push(Predicate::start_after(cursor.clone()));
    }

    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SortOrder;
    use alloc::vec;

    #[test]
    fn test_default_ordering() {
        let spec = build_spec("zones", &FieldMap::default(), &Filters::new());
        assert_eq!(spec.predicates(), &[Predicate::order_by("createdAt", Direction::Desc)]);
    }

    #[test]
    fn test_full_ordering_of_predicates() {
        let filters = Filters::new()
            .scope("c1")
            .status(1i64)
            .category("retail")
            .limit(50)
            .cursor(Boundary::new("z9", Value::Timestamp(9)));
        let spec = build_spec("zones", &FieldMap::default(), &filters);
        assert_eq!(
            spec.predicates(),
            &[
                Predicate::eq("company_Id", "c1"),
                Predicate::eq("status", 1i64),
                Predicate::eq("category", "retail"),
                Predicate::order_by("createdAt", Direction::Desc),
                Predicate::limit(50),
                Predicate::start_after(Boundary::new("z9", Value::Timestamp(9))),
            ]
        );
    }

    #[test]
    fn test_search_switches_sort_field() {
        let filters = Filters::new().search("  Harb ").limit(10);
        let spec = build_spec("zones", &FieldMap::default(), &filters);
        assert_eq!(
            spec.predicates(),
            &[
                Predicate::ge("name_lc", "harb"),
                Predicate::lt("name_lc", "harb\u{f8ff}"),
                Predicate::order_by("name_lc", Direction::Asc),
                Predicate::limit(10),
            ]
        );
        assert_eq!(spec.sort_order(), Some(&SortOrder::asc("name_lc")));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_search_case_preserved() {
        let fields = FieldMap::default().search_field("agent_name", false);
        let spec = build_spec("agents", &fields, &Filters::new().search("Ada"));
        assert_eq!(spec.predicates()[0], Predicate::ge("agent_name", "Ada"));
    }

    #[test]
    fn test_blank_inputs_ignored() {
        let filters = Filters::new().scope("   ").search("   ");
        let spec = build_spec("zones", &FieldMap::default(), &filters);
        assert_eq!(spec.predicates(), &[Predicate::order_by("createdAt", Direction::Desc)]);
    }

    #[test]
    fn test_extra_filters_follow_equality() {
        let fields = FieldMap::default()
            .extra(Predicate::in_list("zone", vec!["z1".into(), "z2".into()]));
        let spec = build_spec("agents", &fields, &Filters::new().scope("c1"));
        assert_eq!(spec.predicates()[0], Predicate::eq("company_Id", "c1"));
        assert!(matches!(spec.predicates()[1], Predicate::In { .. }));
    }

    #[test]
    fn test_custom_field_names() {
        let fields = FieldMap::default()
            .scope_field("companyId")
            .status_field("state")
            .category_field("kind")
            .created_field("created");
        let filters = Filters::new().scope("c1").status(2i64).category("k");
        let spec = build_spec("observations", &fields, &filters);
        assert_eq!(spec.predicates()[0].field(), Some("companyId"));
        assert_eq!(spec.predicates()[1].field(), Some("state"));
        assert_eq!(spec.predicates()[2].field(), Some("kind"));
        assert_eq!(spec.sort_order(), Some(&SortOrder::desc("created")));
    }
}
