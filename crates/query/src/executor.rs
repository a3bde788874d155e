//! Query executor.
//!
//! Evaluates a `QuerySpec` over a set of documents: filter, sort, resume after
//! the cursor, then limit. Used by in-memory transports.

use crate::ast::SortOrder;
use crate::spec::QuerySpec;
use alloc::vec::Vec;
use livejoin_core::{Document, Result, DOCUMENT_ID_FIELD};

/// Executes the spec against `docs` and returns the ordered result.
///
/// Without an ordering, documents are returned by ascending id.
pub fn execute<'a, I>(spec: &QuerySpec, docs: I) -> Result<Vec<Document>>
where
    I: IntoIterator<Item = &'a Document>,
{
    spec.validate()?;

    let order = spec
        .sort_order()
        .cloned()
        .unwrap_or_else(|| SortOrder::asc(DOCUMENT_ID_FIELD));

    let mut rows: Vec<Document> = docs
        .into_iter()
        .filter(|doc| spec.matches(doc))
        .cloned()
        .collect();
    rows.sort_by(|a, b| order.compare(a, b));

    if let Some(cursor) = spec.cursor() {
        rows.retain(|doc| order.is_after(doc, cursor));
    }
    if let Some(limit) = spec.limit() {
        rows.truncate(limit);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Boundary, Direction, Predicate};
    use alloc::vec;
    use livejoin_core::{Error, Value};

    fn zones() -> Vec<Document> {
        (0..10)
            .map(|i| {
                Document::new(alloc::format!("z{}", i))
                    .with("company_Id", if i % 2 == 0 { "c1" } else { "c2" })
                    .with("createdAt", Value::Timestamp(i))
            })
            .collect()
    }

    fn ids(rows: &[Document]) -> Vec<&str> {
        rows.iter().map(|d| d.id()).collect()
    }

    #[test]
    fn test_filter_sort_limit() {
        let docs = zones();
        let spec = QuerySpec::new("zones")
            .with(Predicate::eq("company_Id", "c1"))
            .with(Predicate::order_by("createdAt", Direction::Desc))
            .with(Predicate::limit(3));
        let rows = execute(&spec, &docs).unwrap();
        assert_eq!(ids(&rows), vec!["z8", "z6", "z4"]);
    }

    #[test]
    fn test_start_after() {
        let docs = zones();
        let spec = QuerySpec::new("zones")
            .with(Predicate::order_by("createdAt", Direction::Desc))
            .with(Predicate::limit(3))
            .with(Predicate::start_after(Boundary::new("z7", Value::Timestamp(7))));
        let rows = execute(&spec, &docs).unwrap();
        assert_eq!(ids(&rows), vec!["z6", "z5", "z4"]);
    }

    #[test]
    fn test_reversed_walks_backwards() {
        let docs = zones();
        let forward = QuerySpec::new("zones")
            .with(Predicate::order_by("createdAt", Direction::Desc))
            .with(Predicate::limit(3));
        let backward = forward
            .reversed()
            .with_cursor(Boundary::new("z6", Value::Timestamp(6)));
        let rows = execute(&backward, &docs).unwrap();
        assert_eq!(ids(&rows), vec!["z7", "z8", "z9"]);
    }

    #[test]
    fn test_default_order_by_id() {
        let docs = vec![Document::new("b"), Document::new("a")];
        let rows = execute(&QuerySpec::new("x"), &docs).unwrap();
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_spec_is_rejected() {
        let docs = zones();
        let spec = QuerySpec::new("zones")
            .with(Predicate::ge("createdAt", Value::Timestamp(0)))
            .with(Predicate::lt("company_Id", "c9"));
        assert!(matches!(execute(&spec, &docs), Err(Error::InvalidQuery { .. })));
    }
}
