//! Scope registry and dispatcher
//!
//! `ScopeRegistry` is the per-entity table of rules, fixed at startup.
//! `FilterPipeline` runs every rule registered for a query's entity type, in
//! registration order, against one [`QueryContext`].

use crate::rules::{
    ColumnEqualityRule, ColumnSetMembershipRule, DateWindowRule, FilterRule, OwnershipRule,
    RuleEnv, RuleKind, RuleOutcome, SkipReason, StatusAllowList, TenantRule,
};
use scopekit_core::{
    Capabilities, EntityRegistry, EntityType, FilteredQuery, IsolationError, QueryContext,
    SchemaIntrospector, ScopeConfig, ScopeResult, SqlFragment,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Capability an entity must expose for a rule family to be registered by
/// [`ScopeRegistry::from_schema`].
pub fn required_capabilities(kind: RuleKind) -> Capabilities {
    match kind {
        RuleKind::Active => Capabilities::ACTIVITY,
        RuleKind::Approved => Capabilities::APPROVAL,
        RuleKind::Status => Capabilities::STATUS,
        RuleKind::DateWindow => Capabilities::TEMPORAL,
        RuleKind::Tenant => Capabilities::TENANT,
        RuleKind::Ownership => Capabilities::OWNER,
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Rules per entity type.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    rules: BTreeMap<EntityType, Vec<Arc<dyn FilterRule>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rule set, one of each family, in dispatch order.
    pub fn standard_rules(config: &ScopeConfig) -> ScopeResult<Vec<Arc<dyn FilterRule>>> {
        Ok(vec![
            Arc::new(ColumnEqualityRule::active()),
            Arc::new(ColumnEqualityRule::approved()),
            Arc::new(ColumnSetMembershipRule::status(StatusAllowList::from_config(
                config,
            ))),
            Arc::new(DateWindowRule::standard()),
            Arc::new(TenantRule::from_config(config)),
            Arc::new(OwnershipRule::from_config(config)?),
        ])
    }

    /// Every standard rule on every listed entity. Each rule still checks
    /// for its columns at apply time.
    pub fn uniform<I>(entities: I, config: &ScopeConfig) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = EntityType>,
    {
        let rules = Self::standard_rules(config)?;
        let mut registry = Self::new();
        for entity in entities {
            for rule in &rules {
                registry.register(entity, Arc::clone(rule));
            }
        }
        Ok(registry)
    }

    /// Register only the rule families an entity's fields support.
    pub fn from_schema(schema: &EntityRegistry, config: &ScopeConfig) -> ScopeResult<Self> {
        let rules = Self::standard_rules(config)?;
        let mut registry = Self::new();
        for descriptor in schema.descriptors() {
            let caps = descriptor.capabilities(&config.tenant_column, &config.ownership_columns);
            let mut registered = Vec::new();
            for rule in &rules {
                if caps.intersects(required_capabilities(rule.kind())) {
                    registry.register(descriptor.entity_type, Arc::clone(rule));
                    registered.push(rule.kind().as_str());
                }
            }
            tracing::debug!(
                entity = %descriptor.entity_type,
                capabilities = ?caps,
                rules = ?registered,
                "Registered scopes for entity"
            );
        }
        Ok(registry)
    }

    /// Add a rule for `entity`. A rule of the same kind is replaced in place.
    pub fn register(&mut self, entity: EntityType, rule: Arc<dyn FilterRule>) -> &mut Self {
        let rules = self.rules.entry(entity).or_default();
        match rules.iter().position(|r| r.kind() == rule.kind()) {
            Some(idx) => rules[idx] = rule,
            None => rules.push(rule),
        }
        self
    }

    pub fn with(mut self, entity: EntityType, rule: Arc<dyn FilterRule>) -> Self {
        self.register(entity, rule);
        self
    }

    pub fn rules_for(&self, entity: EntityType) -> &[Arc<dyn FilterRule>] {
        self.rules.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds_for(&self, entity: EntityType) -> Vec<RuleKind> {
        self.rules_for(entity).iter().map(|r| r.kind()).collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.rules.keys().copied()
    }
}

// ============================================================================
// OPTIONS AND REPORT
// ============================================================================

/// Per-query adjustments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    skipped: BTreeSet<RuleKind>,
}

impl ApplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt this query out of one rule family.
    pub fn without(mut self, kind: RuleKind) -> Self {
        self.skipped.insert(kind);
        self
    }

    pub fn skips(&self, kind: RuleKind) -> bool {
        self.skipped.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: RuleKind,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

/// What each rule did to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeReport {
    pub entity: EntityType,
    /// False when the schema did not know the entity and nothing ran.
    pub entity_known: bool,
    pub rules: Vec<RuleReport>,
}

impl ScopeReport {
    fn new(entity: EntityType, entity_known: bool) -> Self {
        Self {
            entity,
            entity_known,
            rules: Vec::new(),
        }
    }

    pub fn outcome(&self, kind: RuleKind) -> Option<RuleOutcome> {
        self.rules.iter().find(|r| r.rule == kind).map(|r| r.outcome)
    }

    pub fn applied(&self) -> impl Iterator<Item = RuleKind> + '_ {
        self.rules
            .iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| r.rule)
    }

    pub fn predicates_added(&self) -> usize {
        self.rules
            .iter()
            .map(|r| match r.outcome {
                RuleOutcome::Applied { predicates } => predicates,
                RuleOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    /// True when a tenant or ownership rule no-opped for lack of context.
    pub fn has_missing_context(&self) -> bool {
        self.rules.iter().any(|r| match r.outcome {
            RuleOutcome::Skipped { reason } => reason.is_missing_context(),
            RuleOutcome::Applied { .. } => false,
        })
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Applies registered scopes to queries.
#[derive(Debug)]
pub struct FilterPipeline<S: SchemaIntrospector> {
    schema: S,
    registry: ScopeRegistry,
    config: ScopeConfig,
}

impl FilterPipeline<EntityRegistry> {
    /// Pipeline whose scopes are derived from the registry's capabilities.
    pub fn for_registry(schema: EntityRegistry, config: ScopeConfig) -> ScopeResult<Self> {
        let registry = ScopeRegistry::from_schema(&schema, &config)?;
        Self::new(schema, registry, config)
    }
}

impl<S: SchemaIntrospector> FilterPipeline<S> {
    pub fn new(schema: S, registry: ScopeRegistry, config: ScopeConfig) -> ScopeResult<Self> {
        config.validate()?;
        Ok(Self {
            schema,
            registry,
            config,
        })
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Fresh, unfiltered query over `entity`.
    pub fn query(&self, entity: EntityType) -> FilteredQuery {
        FilteredQuery::new(entity)
    }

    /// Apply every registered scope.
    pub fn apply(&self, query: FilteredQuery, ctx: &QueryContext) -> ScopeResult<FilteredQuery> {
        self.apply_with(query, ctx, &ApplyOptions::default())
    }

    pub fn apply_with(
        &self,
        query: FilteredQuery,
        ctx: &QueryContext,
        options: &ApplyOptions,
    ) -> ScopeResult<FilteredQuery> {
        self.apply_with_report(query, ctx, options)
            .map(|(query, _)| query)
    }

    /// Apply scopes and report each rule's outcome.
    ///
    /// Permissive mode only fails on a rule construction problem; strict mode
    /// also fails on an unknown entity or absent tenant/principal.
    pub fn apply_with_report(
        &self,
        mut query: FilteredQuery,
        ctx: &QueryContext,
        options: &ApplyOptions,
    ) -> ScopeResult<(FilteredQuery, ScopeReport)> {
        let entity = query.entity();

        if !self.schema.knows_entity(entity) {
            if self.config.isolation_mode.is_strict() {
                return Err(IsolationError::UnknownEntity { entity }.into());
            }
            if self.config.log_skipped_rules {
                tracing::warn!(
                    entity = %entity,
                    "Entity type unknown to schema; no scopes applied"
                );
            }
            return Ok((query, ScopeReport::new(entity, false)));
        }

        let env = RuleEnv {
            schema: &self.schema,
            context: ctx,
            config: &self.config,
        };
        let mut report = ScopeReport::new(entity, true);

        for rule in self.registry.rules_for(entity) {
            let kind = rule.kind();
            let outcome = if options.skips(kind) {
                RuleOutcome::skipped(SkipReason::OptedOut)
            } else {
                rule.apply(&mut query, &env)?
            };
            tracing::debug!(
                entity = %entity,
                rule = %kind,
                outcome = ?outcome,
                "Scope rule evaluated"
            );
            report.rules.push(RuleReport {
                rule: kind,
                outcome,
            });
        }

        Ok((query, report))
    }

    /// Scoped `SELECT *` for `entity`.
    pub fn select(&self, entity: EntityType, ctx: &QueryContext) -> ScopeResult<SqlFragment> {
        let query = self.apply(self.query(entity), ctx)?;
        let table = self
            .schema
            .table_name(entity)
            .unwrap_or_else(|| entity.default_table());
        query.to_select(&table)
    }
}
