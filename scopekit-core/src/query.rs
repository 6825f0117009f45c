//! Filtered query builder
//!
//! A `FilteredQuery` is an AND-list of predicates against one entity type.
//! Each rule contributes at most one entry; multi-column alternatives from
//! the same rule arrive pre-grouped as a single `Predicate::Or`.

use crate::sql::{quote_identifier, render_conjunction, SqlFragment};
use crate::{EntityType, Predicate, Row, ScopeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredQuery {
    entity: EntityType,
    predicates: Vec<Predicate>,
}

impl FilteredQuery {
    /// An unfiltered query over `entity`.
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            predicates: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_unfiltered(&self) -> bool {
        self.predicates.is_empty()
    }

    /// AND a predicate onto the query.
    ///
    /// Returns `false` when a structurally equal predicate is already present;
    /// the query is left untouched in that case.
    pub fn and_where(&mut self, predicate: Predicate) -> bool {
        if self.predicates.contains(&predicate) {
            return false;
        }
        self.predicates.push(predicate);
        true
    }

    /// Builder form of [`FilteredQuery::and_where`].
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.and_where(predicate);
        self
    }

    /// AND an OR-group of alternatives onto the query.
    ///
    /// An empty group contributes nothing rather than an always-false filter.
    pub fn and_where_any(&mut self, alternatives: Vec<Predicate>) -> bool {
        if alternatives.is_empty() {
            return false;
        }
        self.and_where(Predicate::any(alternatives))
    }

    /// Evaluate the query against an in-memory row.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Keep the rows that satisfy every predicate.
    pub fn filter_rows<'a, I>(&self, rows: I) -> Vec<&'a Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }

    /// Render the WHERE body (without the keyword). Empty when unfiltered.
    pub fn to_where_clause(&self) -> ScopeResult<SqlFragment> {
        render_conjunction(&self.predicates)
    }

    /// Render a full `SELECT *` statement against `table`.
    pub fn to_select(&self, table: &str) -> ScopeResult<SqlFragment> {
        let table = quote_identifier(table)?;
        let clause = self.to_where_clause()?;
        let sql = if clause.is_empty() {
            format!("SELECT * FROM {}", table)
        } else {
            format!("SELECT * FROM {} WHERE {}", table, clause.sql)
        };
        Ok(SqlFragment {
            sql,
            params: clause.params,
        })
    }
}
