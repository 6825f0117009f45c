use super::{log_missing_context, FilterRule, RuleEnv, RuleKind, RuleOutcome, SkipReason};
use scopekit_core::{
    FilteredQuery, IsolationError, Predicate, SchemaIntrospector, ScopeConfig, ScopeResult,
};

/// `tenant_column = current tenant`.
///
/// Applies to privileged principals too; only ownership is bypassed by
/// privilege.
#[derive(Debug, Clone)]
pub struct TenantRule {
    column: String,
}

impl TenantRule {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.tenant_column.as_str())
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl FilterRule for TenantRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Tenant
    }

    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool {
        schema.has_field(query.entity(), &self.column)
    }

    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome> {
        if !self.is_applicable(query, env.schema) {
            return Ok(RuleOutcome::skipped(SkipReason::NotApplicable));
        }

        let Some(tenant) = env.context.current_tenant_id else {
            if env.config.isolation_mode.is_strict() {
                return Err(IsolationError::MissingTenant {
                    entity: query.entity(),
                }
                .into());
            }
            log_missing_context(env, self.kind(), query, SkipReason::NoTenant);
            return Ok(RuleOutcome::skipped(SkipReason::NoTenant));
        };

        let added = query.and_where(Predicate::eq(self.column.as_str(), tenant));
        Ok(RuleOutcome::Applied {
            predicates: usize::from(added),
        })
    }
}
