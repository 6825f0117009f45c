//! PostgreSQL rendering for predicate trees
//!
//! Values are never inlined: every literal becomes a `$n` positional
//! parameter. Column names are validated and double-quoted.

use crate::{Predicate, QueryError, ScopeResult, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("Invalid identifier regex"));

/// Whether `ident` is safe to use as a column or table name.
pub fn is_valid_identifier(ident: &str) -> bool {
    IDENTIFIER.is_match(ident)
}

pub fn quote_identifier(ident: &str) -> ScopeResult<String> {
    if !is_valid_identifier(ident) {
        return Err(QueryError::InvalidIdentifier {
            ident: ident.to_string(),
        }
        .into());
    }
    Ok(format!("\"{}\"", ident))
}

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Render a conjunction of predicates. An empty slice renders to an empty
/// fragment (no WHERE clause at all).
pub fn render_conjunction(predicates: &[Predicate]) -> ScopeResult<SqlFragment> {
    let mut params = Vec::new();
    let mut parts = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        parts.push(render_into(predicate, &mut params)?);
    }
    Ok(SqlFragment {
        sql: parts.join(" AND "),
        params,
    })
}

fn push_param(params: &mut Vec<Value>, value: &Value) -> String {
    params.push(value.clone());
    format!("${}", params.len())
}

fn render_into(predicate: &Predicate, params: &mut Vec<Value>) -> ScopeResult<String> {
    let sql = match predicate {
        Predicate::Compare { column, op, value } => {
            let col = quote_identifier(column)?;
            format!("{} {} {}", col, op.as_sql(), push_param(params, value))
        }
        Predicate::In { column, values } => {
            let col = quote_identifier(column)?;
            if values.is_empty() {
                "FALSE".to_string()
            } else {
                let placeholders: Vec<String> =
                    values.iter().map(|v| push_param(params, v)).collect();
                format!("{} IN ({})", col, placeholders.join(", "))
            }
        }
        Predicate::IsNull { column } => format!("{} IS NULL", quote_identifier(column)?),
        Predicate::IsNotNull { column } => format!("{} IS NOT NULL", quote_identifier(column)?),
        Predicate::And { predicates } => render_group(predicates, " AND ", "TRUE", params)?,
        Predicate::Or { predicates } => render_group(predicates, " OR ", "FALSE", params)?,
        Predicate::Not { predicate } => format!("NOT ({})", render_into(predicate, params)?),
    };
    Ok(sql)
}

fn render_group(
    predicates: &[Predicate],
    joiner: &str,
    empty: &str,
    params: &mut Vec<Value>,
) -> ScopeResult<String> {
    if predicates.is_empty() {
        return Ok(empty.to_string());
    }
    let mut parts = Vec::with_capacity(predicates.len());
    for p in predicates {
        parts.push(render_into(p, params)?);
    }
    Ok(format!("({})", parts.join(joiner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeError;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("tenant_id"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("status; DROP TABLE orders"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_render_or_group_numbers_params_in_order() -> ScopeResult<()> {
        let p = Predicate::any(vec![
            Predicate::eq("user_id", 5i64),
            Predicate::eq("owner_id", 5i64),
        ]);
        let frag = render_conjunction(&[Predicate::eq("tenant_id", 7i64), p])?;
        assert_eq!(
            frag.sql,
            "\"tenant_id\" = $1 AND (\"user_id\" = $2 OR \"owner_id\" = $3)"
        );
        assert_eq!(frag.params, vec![Value::Int(7), Value::Int(5), Value::Int(5)]);
        Ok(())
    }

    #[test]
    fn test_render_null_checks_and_in() -> ScopeResult<()> {
        let frag = render_conjunction(&[
            Predicate::any(vec![Predicate::is_null("expires_at"), Predicate::is_not_null("x")]),
            Predicate::is_in("status", ["active", "running"]),
        ])?;
        assert_eq!(
            frag.sql,
            "(\"expires_at\" IS NULL OR \"x\" IS NOT NULL) AND \"status\" IN ($1, $2)"
        );
        Ok(())
    }

    #[test]
    fn test_render_rejects_bad_identifier() {
        let err = render_conjunction(&[Predicate::eq("a b", 1i64)]).unwrap_err();
        assert!(matches!(
            err,
            ScopeError::Query(QueryError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_empty_conjunction_is_empty() -> ScopeResult<()> {
        assert!(render_conjunction(&[])?.is_empty());
        Ok(())
    }
}
