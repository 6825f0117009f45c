//! Predicate tree for scoped queries
//!
//! Predicates are plain values: rules build them, `FilteredQuery` collects
//! them, and they can be rendered to SQL or evaluated against an in-memory
//! `Row` with SQL three-valued logic.

use crate::{Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operator for column predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A boolean condition over the columns of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
    And {
        predicates: Vec<Predicate>,
    },
    Or {
        predicates: Vec<Predicate>,
    },
    Not {
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Create an equality predicate.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// Create a set-membership predicate.
    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull {
            column: column.into(),
        }
    }

    /// Conjunction. A single operand is returned as-is.
    pub fn all(mut predicates: Vec<Predicate>) -> Self {
        if predicates.len() == 1 {
            return predicates.remove(0);
        }
        Predicate::And { predicates }
    }

    /// Disjunction. A single operand is returned as-is.
    pub fn any(mut predicates: Vec<Predicate>) -> Self {
        if predicates.len() == 1 {
            return predicates.remove(0);
        }
        Predicate::Or { predicates }
    }

    pub fn negate(self) -> Self {
        Predicate::Not {
            predicate: Box::new(self),
        }
    }

    /// Every column referenced by this predicate, in tree order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column } => out.push(column.as_str()),
            Predicate::And { predicates } | Predicate::Or { predicates } => {
                for p in predicates {
                    p.collect_columns(out);
                }
            }
            Predicate::Not { predicate } => predicate.collect_columns(out),
        }
    }

    /// Three-valued evaluation against a row.
    ///
    /// `Some(true)` / `Some(false)` are definite, `None` is SQL UNKNOWN.
    pub fn evaluate(&self, row: &Row) -> Option<bool> {
        match self {
            Predicate::Compare { column, op, value } => {
                let cell = row.get(column).unwrap_or(&Value::Null);
                cell.sql_cmp(value).map(|ord| op.holds(ord))
            }
            Predicate::In { column, values } => {
                let cell = row.get(column).unwrap_or(&Value::Null);
                if cell.is_null() {
                    return None;
                }
                let mut unknown = false;
                for candidate in values {
                    match cell.sql_cmp(candidate) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::IsNull { column } => {
                Some(row.get(column).map_or(true, Value::is_null))
            }
            Predicate::IsNotNull { column } => {
                Some(!row.get(column).map_or(true, Value::is_null))
            }
            Predicate::And { predicates } => {
                let mut result = Some(true);
                for p in predicates {
                    match p.evaluate(row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Or { predicates } => {
                let mut result = Some(false);
                for p in predicates {
                    match p.evaluate(row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Predicate::Not { predicate } => predicate.evaluate(row).map(|b| !b),
        }
    }

    /// Whether the row satisfies the predicate. UNKNOWN does not match.
    pub fn matches(&self, row: &Row) -> bool {
        self.evaluate(row) == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Value)]) -> Row {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_eq_matches() {
        let p = Predicate::eq("status", "shipped");
        assert!(p.matches(&row(&[("status", "shipped".into())])));
        assert!(!p.matches(&row(&[("status", "draft".into())])));
    }

    #[test]
    fn test_missing_column_reads_as_null() {
        let p = Predicate::eq("user_id", 3i64);
        assert_eq!(p.evaluate(&Row::new()), None);
        assert!(Predicate::is_null("user_id").matches(&Row::new()));
    }

    #[test]
    fn test_or_with_unknown_and_true_is_true() {
        let p = Predicate::any(vec![Predicate::eq("a", 1i64), Predicate::eq("b", 2i64)]);
        assert_eq!(p.evaluate(&row(&[("b", Value::Int(2))])), Some(true));
        assert_eq!(p.evaluate(&row(&[("b", Value::Int(5))])), None);
    }

    #[test]
    fn test_and_short_circuits_on_false() {
        let p = Predicate::all(vec![Predicate::eq("a", 1i64), Predicate::eq("b", 2i64)]);
        assert_eq!(p.evaluate(&row(&[("b", Value::Int(3))])), Some(false));
    }

    #[test]
    fn test_not_of_unknown_is_unknown() {
        let p = Predicate::eq("a", 1i64).negate();
        assert_eq!(p.evaluate(&Row::new()), None);
        assert!(!p.matches(&Row::new()));
    }

    #[test]
    fn test_in_semantics() {
        let p = Predicate::is_in("status", ["pending", "shipped"]);
        assert!(p.matches(&row(&[("status", "pending".into())])));
        assert_eq!(p.evaluate(&row(&[("status", "draft".into())])), Some(false));
        assert_eq!(p.evaluate(&row(&[("status", Value::Null)])), None);
    }

    #[test]
    fn test_single_operand_groups_collapse() {
        let eq = Predicate::eq("a", 1i64);
        assert_eq!(Predicate::any(vec![eq.clone()]), eq);
        assert_eq!(Predicate::all(vec![eq.clone()]), eq);
    }

    #[test]
    fn test_columns_lists_every_reference() {
        let p = Predicate::all(vec![
            Predicate::is_not_null("published_at"),
            Predicate::any(vec![Predicate::is_null("ends_at"), Predicate::eq("x", 1i64)]),
        ]);
        assert_eq!(p.columns(), vec!["published_at", "ends_at", "x"]);
    }
}
