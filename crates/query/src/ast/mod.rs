//! AST module for predicates and ordering.

mod order;
mod predicate;

pub use order::{Boundary, Direction, SortOrder};
pub use predicate::Predicate;
