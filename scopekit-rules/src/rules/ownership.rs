use super::{log_missing_context, FilterRule, RuleEnv, RuleKind, RuleOutcome, SkipReason};
use crate::composer::{and_any_equal, first_present, present_columns};
use scopekit_core::{
    FilteredQuery, IsolationError, QueryError, SchemaIntrospector, ScopeConfig, ScopeResult, Value,
};

/// Restricts non-privileged principals to rows they own.
///
/// Every ownership column present on the entity becomes an OR alternative:
/// `(user_id = p OR created_by = p OR ...)`.
#[derive(Debug, Clone)]
pub struct OwnershipRule {
    columns: Vec<String>,
}

impl OwnershipRule {
    pub fn new<I, S>(columns: I) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(QueryError::EmptyColumnSet {
                rule: RuleKind::Ownership.to_string(),
            }
            .into());
        }
        Ok(Self { columns })
    }

    /// Uses `ownership_columns`; a validated config always has at least one.
    pub fn from_config(config: &ScopeConfig) -> ScopeResult<Self> {
        Self::new(config.ownership_columns.iter().cloned())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl FilterRule for OwnershipRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Ownership
    }

    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool {
        first_present(schema, query.entity(), &self.columns).is_some()
    }

    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome> {
        if env.context.is_privileged {
            return Ok(RuleOutcome::skipped(SkipReason::PrivilegedBypass));
        }

        let present = present_columns(env.schema, query.entity(), &self.columns);
        if present.is_empty() {
            return Ok(RuleOutcome::skipped(SkipReason::NotApplicable));
        }

        let Some(principal) = env.context.current_principal_id else {
            if env.config.isolation_mode.is_strict() {
                return Err(IsolationError::MissingPrincipal {
                    entity: query.entity(),
                }
                .into());
            }
            log_missing_context(env, self.kind(), query, SkipReason::NoPrincipal);
            return Ok(RuleOutcome::skipped(SkipReason::NoPrincipal));
        };

        let added = and_any_equal(query, &present, &Value::from(principal));
        Ok(RuleOutcome::Applied { predicates: added })
    }
}
