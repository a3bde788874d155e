//! Snapshot merging.
//!
//! Combines the visible primary rows with every relation's cached child value
//! into one immutable snapshot.

use crate::fanout::{ChildValue, RelationState};
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use livejoin_core::Document;
use livejoin_query::Boundary;

/// A primary record with one joined value per configured relation.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRow {
    pub document: Document,
    pub joins: BTreeMap<String, ChildValue>,
}

impl JoinedRow {
    #[inline]
    pub fn id(&self) -> &str {
        self.document.id()
    }

    /// Returns the joined value of a relation.
    pub fn join(&self, relation: &str) -> Option<&ChildValue> {
        self.joins.get(relation)
    }

    /// Returns the child count of a relation, zero if unknown.
    pub fn count(&self, relation: &str) -> usize {
        self.joins.get(relation).map(ChildValue::len).unwrap_or(0)
    }
}

/// One emission delivered to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub rows: Rc<[JoinedRow]>,
    /// 1-based page index.
    pub page: usize,
    pub first: Option<Boundary>,
    pub last: Option<Boundary>,
    pub has_more: bool,
}

impl Snapshot {
    /// An empty first page.
    pub fn empty() -> Self {
        Self {
            rows: Rc::from(Vec::new()),
            page: 1,
            first: None,
            last: None,
            has_more: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids of the rows in display order.
    pub fn ids(&self) -> Vec<&str> {
        self.rows.iter().map(JoinedRow::id).collect()
    }

    /// Finds a row by document id.
    pub fn get(&self, id: &str) -> Option<&JoinedRow> {
        self.rows.iter().find(|row| row.id() == id)
    }
}

/// Attaches each relation's value to every row, keeping row order.
pub fn merge(rows: &[Document], relations: &[RelationState]) -> Vec<JoinedRow> {
    rows.iter()
        .map(|doc| {
            let joins = relations
                .iter()
                .map(|state| (state.relation().name.clone(), state.value_for(doc)))
                .collect();
            JoinedRow {
                document: doc.clone(),
                joins,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Relation;
    use alloc::vec;

    fn states() -> Vec<RelationState> {
        vec![
            RelationState::new(Relation::count("agentCount", "agents", "company_Id")),
            RelationState::new(Relation::rows("agents", "agents", "company_Id")),
            RelationState::new(Relation::lookup("parent", "companies", "parent_Id")),
        ]
    }

    #[test]
    fn test_merge_attaches_every_relation() {
        let rows = vec![Document::new("c1"), Document::new("c2").with("parent_Id", "p1")];
        let merged = merge(&rows, &states());
        assert_eq!(merged.len(), 2);
        for row in &merged {
            assert_eq!(row.joins.len(), 3);
        }
        assert_eq!(merged[0].join("agentCount"), Some(&ChildValue::Count(0)));
        assert_eq!(merged[0].join("agents"), Some(&ChildValue::Rows(vec![])));
        assert_eq!(merged[1].join("parent"), Some(&ChildValue::Lookup(None)));
    }

    #[test]
    fn test_merge_uses_cache() {
        let mut relations = states();
        let rows = vec![Document::new("c1"), Document::new("c2")];
        let mut gen = 0;
        let (_, opening) = relations[0].plan(0, &rows, &mut || {
            gen += 1;
            gen
        });
        let c1 = opening.iter().find(|o| o.key == "c1").map(|o| o.generation);
        assert!(relations[0].accept(
            "c1",
            c1.unwrap_or_default(),
            vec![Document::new("a1"), Document::new("a2")]
        ));

        let merged = merge(&rows, &relations);
        assert_eq!(merged[0].count("agentCount"), 2);
        assert_eq!(merged[1].count("agentCount"), 0);
        assert_eq!(merged[0].id(), "c1");
    }

    #[test]
    fn test_snapshot_helpers() {
        let snapshot = Snapshot {
            rows: Rc::from(merge(&[Document::new("a"), Document::new("b")], &[])),
            page: 1,
            first: None,
            last: None,
            has_more: false,
        };
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
        assert!(snapshot.get("b").is_some());
        assert!(Snapshot::empty().is_empty());
    }
}
