use super::{FilterRule, RuleEnv, RuleKind, RuleOutcome, SkipReason};
use crate::composer::{and_any_equal, first_present, present_columns};
use scopekit_core::{
    columns, FilteredQuery, Predicate, QueryError, SchemaIntrospector, ScopeResult, Value,
};

/// How multiple candidate columns combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Only the first present column is filtered on.
    FirstPresent,
    /// Every present column is an OR alternative.
    AnyPresent,
}

/// `column = value` over a list of candidate columns.
#[derive(Debug, Clone)]
pub struct ColumnEqualityRule {
    kind: RuleKind,
    candidates: Vec<String>,
    value: Value,
    precedence: Precedence,
}

impl ColumnEqualityRule {
    pub fn new<I, S>(
        kind: RuleKind,
        candidates: I,
        value: impl Into<Value>,
        precedence: Precedence,
    ) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
        if candidates.is_empty() {
            return Err(QueryError::EmptyColumnSet {
                rule: kind.to_string(),
            }
            .into());
        }
        Ok(Self {
            kind,
            candidates,
            value: value.into(),
            precedence,
        })
    }

    /// `is_active`, else `is_enabled`, else `is_visible` must be true.
    pub fn active() -> Self {
        Self {
            kind: RuleKind::Active,
            candidates: columns::ACTIVITY_FLAGS.iter().map(|c| c.to_string()).collect(),
            value: Value::Bool(true),
            precedence: Precedence::FirstPresent,
        }
    }

    /// `is_approved` must be true.
    pub fn approved() -> Self {
        Self {
            kind: RuleKind::Approved,
            candidates: vec![columns::IS_APPROVED.to_string()],
            value: Value::Bool(true),
            precedence: Precedence::FirstPresent,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl FilterRule for ColumnEqualityRule {
    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool {
        first_present(schema, query.entity(), &self.candidates).is_some()
    }

    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome> {
        let entity = query.entity();
        let added = match self.precedence {
            Precedence::FirstPresent => {
                match first_present(env.schema, entity, &self.candidates) {
                    Some(column) => {
                        usize::from(query.and_where(Predicate::eq(column, self.value.clone())))
                    }
                    None => return Ok(RuleOutcome::skipped(SkipReason::NotApplicable)),
                }
            }
            Precedence::AnyPresent => {
                let present = present_columns(env.schema, entity, &self.candidates);
                if present.is_empty() {
                    return Ok(RuleOutcome::skipped(SkipReason::NotApplicable));
                }
                and_any_equal(query, &present, &self.value)
            }
        };
        Ok(RuleOutcome::Applied { predicates: added })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scopekit_core::{
        EntityDescriptor, EntityRegistry, EntityType, QueryContext, ScopeConfig, ScopeError,
    };

    fn run(
        rule: &ColumnEqualityRule,
        schema: &EntityRegistry,
        entity: EntityType,
    ) -> FilteredQuery {
        let ctx = QueryContext::anonymous(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let config = ScopeConfig::default();
        let env = RuleEnv {
            schema,
            context: &ctx,
            config: &config,
        };
        let mut query = FilteredQuery::new(entity);
        rule.apply(&mut query, &env).expect("equality rules never fail");
        query
    }

    #[test]
    fn test_active_uses_first_present_flag_only() {
        let schema = EntityRegistry::new().with(EntityDescriptor::new(
            EntityType::Product,
            ["id", "is_visible", "is_enabled"],
        ));
        let query = run(&ColumnEqualityRule::active(), &schema, EntityType::Product);
        assert_eq!(query.predicates(), &[Predicate::eq("is_enabled", true)]);
    }

    #[test]
    fn test_active_without_flags_is_noop() {
        let schema =
            EntityRegistry::new().with(EntityDescriptor::new(EntityType::Address, ["id", "city"]));
        let query = run(&ColumnEqualityRule::active(), &schema, EntityType::Address);
        assert!(query.is_unfiltered());
    }

    #[test]
    fn test_approved() {
        let schema = EntityRegistry::new().with(EntityDescriptor::new(
            EntityType::Review,
            ["id", "is_approved"],
        ));
        let rule = ColumnEqualityRule::approved();
        assert!(rule.is_applicable(&FilteredQuery::new(EntityType::Review), &schema));
        let query = run(&rule, &schema, EntityType::Review);
        assert_eq!(query.predicates(), &[Predicate::eq("is_approved", true)]);
    }

    #[test]
    fn test_any_present_builds_or_group() -> ScopeResult<()> {
        let schema = EntityRegistry::new().with(EntityDescriptor::new(
            EntityType::Banner,
            ["is_visible", "is_active"],
        ));
        let rule = ColumnEqualityRule::new(
            RuleKind::Active,
            ["is_active", "is_enabled", "is_visible"],
            true,
            Precedence::AnyPresent,
        )?;
        let query = run(&rule, &schema, EntityType::Banner);
        assert_eq!(
            query.predicates(),
            &[Predicate::any(vec![
                Predicate::eq("is_active", true),
                Predicate::eq("is_visible", true),
            ])]
        );
        Ok(())
    }

    #[test]
    fn test_new_rejects_empty_candidates() {
        let err = ColumnEqualityRule::new(
            RuleKind::Approved,
            Vec::<String>::new(),
            true,
            Precedence::FirstPresent,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScopeError::Query(QueryError::EmptyColumnSet { .. })
        ));
    }
}
