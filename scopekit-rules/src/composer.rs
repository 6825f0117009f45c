//! Predicate composition helpers shared by the rules.

use scopekit_core::{EntityType, FilteredQuery, Predicate, SchemaIntrospector, Value};

/// Candidate columns that exist on `entity`, in candidate order.
pub fn present_columns<'a, S: AsRef<str>>(
    schema: &dyn SchemaIntrospector,
    entity: EntityType,
    candidates: &'a [S],
) -> Vec<&'a str> {
    candidates
        .iter()
        .map(|column| column.as_ref())
        .filter(|column| schema.has_field(entity, column))
        .collect()
}

/// First candidate column that exists on `entity`.
pub fn first_present<'a, S: AsRef<str>>(
    schema: &dyn SchemaIntrospector,
    entity: EntityType,
    candidates: &'a [S],
) -> Option<&'a str> {
    candidates
        .iter()
        .map(|column| column.as_ref())
        .find(|column| schema.has_field(entity, column))
}

/// One equality alternative per column.
pub fn equality_alternatives(columns: &[&str], value: &Value) -> Vec<Predicate> {
    columns
        .iter()
        .map(|column| Predicate::eq(*column, value.clone()))
        .collect()
}

/// AND `(c1 = v OR c2 = v OR ...)` onto the query.
///
/// Returns the number of predicates added: 0 when `columns` is empty or the
/// same group is already present, 1 otherwise.
pub fn and_any_equal(query: &mut FilteredQuery, columns: &[&str], value: &Value) -> usize {
    usize::from(query.and_where_any(equality_alternatives(columns, value)))
}
