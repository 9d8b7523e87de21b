//! Read predicates over an entity row and its relation joins.

use crate::config::{ColumnPath, SqlType};
use crate::sql::SqlValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// Case-insensitive substring match.
    Contains,
    Eq,
    Gte,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        path: ColumnPath,
        op: CompareOp,
        value: SqlValue,
        value_type: SqlType,
    },
    /// Row is linked to `parent_id` through a join table.
    Linked {
        join_table: &'static str,
        row_column: &'static str,
        parent_column: &'static str,
        parent_id: uuid::Uuid,
    },
}

impl Predicate {
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self, Predicate::And(v) if v.is_empty())
    }

    /// Conjunction that drops trivially-true members and flattens nested ANDs.
    pub fn and(parts: Vec<Predicate>) -> Self {
        let mut out = Vec::new();
        for p in parts {
            match p {
                Predicate::And(inner) => out.extend(inner.into_iter().filter(|q| !q.is_trivial())),
                other => out.push(other),
            }
        }
        Predicate::And(out)
    }
}
