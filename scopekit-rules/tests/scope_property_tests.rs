//! Property-Based Tests for Scope Rules
//!
//! Each rule only ever narrows a query, contributes nothing when its columns
//! are absent, and is harmless to re-apply.

use chrono::Duration;
use proptest::prelude::*;
use scopekit_core::{
    columns, EntityDescriptor, EntityRegistry, EntityType, FilteredQuery, IsolationMode,
    Predicate, QueryContext, ScopeConfig, ScopeResult,
};
use scopekit_rules::{
    ColumnEqualityRule, FilterPipeline, FilterRule, OwnershipRule, RuleEnv, ScopeRegistry,
};
use scopekit_test_utils::assertions::{assert_excludes_all, assert_missing_tenant};
use scopekit_test_utils::fixtures::row;
use scopekit_test_utils::generators::*;
use std::collections::BTreeSet;

// ============================================================================
// HELPERS
// ============================================================================

fn pipeline_for(
    descriptor: EntityDescriptor,
    config: ScopeConfig,
) -> Result<FilterPipeline<EntityRegistry>, TestCaseError> {
    let schema = EntityRegistry::new().with(descriptor);
    ScopeRegistry::uniform(EntityType::ALL, &config)
        .and_then(|scopes| FilterPipeline::new(schema, scopes, config))
        .map_err(|e| TestCaseError::fail(format!("Failed to build pipeline: {}", e)))
}

fn apply_rule(
    rule: &dyn FilterRule,
    schema: &EntityRegistry,
    entity: EntityType,
    ctx: &QueryContext,
) -> ScopeResult<FilteredQuery> {
    let config = ScopeConfig::default();
    let env = RuleEnv {
        schema,
        context: ctx,
        config: &config,
    };
    let mut query = FilteredQuery::new(entity);
    rule.apply(&mut query, &env)?;
    Ok(query)
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

fn descriptor_and_row() -> impl Strategy<Value = (EntityDescriptor, scopekit_core::Row)> {
    (arb_entity_type(), arb_field_set()).prop_flat_map(|(entity, fields)| {
        let rows = arb_row(&fields);
        (Just(EntityDescriptor::new(entity, fields)), rows)
    })
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Ownerless entities are untouched by ownership**
    #[test]
    fn prop_ownerless_entity_untouched(
        entity in arb_entity_type(),
        fields in arb_ownerless_field_set(),
        ctx in arb_query_context(),
    ) {
        let schema = EntityRegistry::new().with(EntityDescriptor::new(entity, fields));
        let rule = OwnershipRule::from_config(&ScopeConfig::default()).map_err(fail)?;
        let query = apply_rule(&rule, &schema, entity, &ctx).map_err(fail)?;
        prop_assert_eq!(query, FilteredQuery::new(entity));
    }

    /// **Property 2: Active rule honours flag precedence**
    #[test]
    fn prop_active_uses_first_present_flag(
        entity in arb_entity_type(),
        fields in arb_field_set(),
        ctx in arb_query_context(),
    ) {
        let expected = columns::ACTIVITY_FLAGS
            .iter()
            .find(|c| fields.contains(**c))
            .map(|c| Predicate::eq(*c, true));
        let schema = EntityRegistry::new().with(EntityDescriptor::new(entity, fields));
        let query = apply_rule(&ColumnEqualityRule::active(), &schema, entity, &ctx)
            .map_err(fail)?;
        prop_assert_eq!(query.predicates().to_vec(), expected.into_iter().collect::<Vec<_>>());
    }

    /// **Property 3: Privileged principals are never owner-filtered**
    #[test]
    fn prop_privileged_never_owner_filtered(
        entity in arb_entity_type(),
        fields in arb_field_set(),
        ctx in arb_query_context(),
    ) {
        let principal = ctx.current_principal_id.unwrap_or(scopekit_core::PrincipalId::new(1));
        let ctx = ctx.with_principal(principal, true);
        let pipeline = pipeline_for(EntityDescriptor::new(entity, fields), ScopeConfig::default())?;
        let query = pipeline.apply(pipeline.query(entity), &ctx).map_err(fail)?;

        let owner_columns: BTreeSet<&str> = columns::DEFAULT_OWNERSHIP.into_iter().collect();
        for predicate in query.predicates() {
            prop_assert!(predicate.columns().iter().all(|c| !owner_columns.contains(c)));
        }
    }

    /// **Property 4: A window that has not started matches nothing**
    #[test]
    fn prop_future_window_matches_nothing(
        ctx in arb_query_context(),
        start_in in 1i64..1_000_000,
        length in 0i64..1_000_000,
    ) {
        let pipeline = pipeline_for(
            EntityDescriptor::new(EntityType::Campaign, ["id", "starts_at", "ends_at"]),
            ScopeConfig::default(),
        )?;
        let query = pipeline.apply(pipeline.query(EntityType::Campaign), &ctx).map_err(fail)?;
        let starts = ctx.now + Duration::seconds(start_in);
        let rows = vec![row()
            .set("starts_at", starts)
            .set("ends_at", starts + Duration::seconds(length))
            .build()];
        assert_excludes_all(&query, &rows);
    }

    /// **Property 5: A window that has ended matches nothing, whatever the start**
    #[test]
    fn prop_ended_window_matches_nothing(
        ctx in arb_query_context(),
        ended_ago in 1i64..1_000_000,
        start in proptest::option::of(arb_timestamp()),
    ) {
        let pipeline = pipeline_for(
            EntityDescriptor::new(EntityType::Campaign, ["id", "starts_at", "ends_at"]),
            ScopeConfig::default(),
        )?;
        let query = pipeline.apply(pipeline.query(EntityType::Campaign), &ctx).map_err(fail)?;
        let rows = vec![row()
            .set("starts_at", start)
            .set("ends_at", ctx.now - Duration::seconds(ended_ago))
            .build()];
        assert_excludes_all(&query, &rows);
    }

    /// **Property 6: Re-applying scopes changes nothing**
    #[test]
    fn prop_reapplication_is_idempotent(
        descriptor in arb_descriptor(),
        ctx in arb_query_context(),
    ) {
        let entity = descriptor.entity_type;
        let pipeline = pipeline_for(descriptor, ScopeConfig::default())?;
        let once = pipeline.apply(pipeline.query(entity), &ctx).map_err(fail)?;
        let twice = pipeline.apply(once.clone(), &ctx).map_err(fail)?;
        prop_assert_eq!(once, twice);
    }

    /// **Property 7: Permissive mode never fails**
    #[test]
    fn prop_permissive_never_errors(
        descriptor in arb_descriptor(),
        ctx in arb_query_context(),
        unknown in arb_entity_type(),
    ) {
        let pipeline = pipeline_for(descriptor, ScopeConfig::default())?;
        prop_assert!(pipeline.apply(pipeline.query(unknown), &ctx).is_ok());
    }

    /// **Property 8: Rules combine by AND**
    ///
    /// A row passes the scoped query exactly when it passes every rule on
    /// its own.
    #[test]
    fn prop_rules_combine_by_conjunction(
        (descriptor, sample) in descriptor_and_row(),
        ctx in arb_query_context(),
    ) {
        let entity = descriptor.entity_type;
        let config = ScopeConfig::default();
        let schema = EntityRegistry::new().with(descriptor.clone());
        let pipeline = pipeline_for(descriptor, config.clone())?;
        let combined = pipeline.apply(pipeline.query(entity), &ctx).map_err(fail)?;

        let mut each = true;
        for rule in ScopeRegistry::standard_rules(&config).map_err(fail)? {
            let alone = apply_rule(rule.as_ref(), &schema, entity, &ctx).map_err(fail)?;
            each &= alone.matches(&sample);
        }
        prop_assert_eq!(combined.matches(&sample), each);
    }

    /// **Property 9: Tenant scoping excludes other tenants' rows**
    #[test]
    fn prop_other_tenant_rows_excluded(
        tenant in arb_tenant_id(),
        other in arb_tenant_id(),
        now in arb_timestamp(),
    ) {
        prop_assume!(tenant != other);
        let pipeline = pipeline_for(
            EntityDescriptor::new(EntityType::Cart, ["id", "tenant_id"]),
            ScopeConfig::default(),
        )?;
        let ctx = QueryContext::anonymous(now).with_tenant(tenant);
        let query = pipeline.apply(pipeline.query(EntityType::Cart), &ctx).map_err(fail)?;
        prop_assert!(query.matches(&row().set("tenant_id", tenant).build()));
        prop_assert!(!query.matches(&row().set("tenant_id", other).build()));
    }

    /// **Property 10: Strict mode refuses tenant-scoped queries without a tenant**
    #[test]
    fn prop_strict_requires_tenant(
        entity in arb_entity_type(),
        fields in arb_field_set(),
        principal in arb_principal_id(),
        now in arb_timestamp(),
    ) {
        let mut fields = fields;
        fields.insert(columns::TENANT_ID.to_string());
        let config = ScopeConfig {
            isolation_mode: IsolationMode::Strict,
            ..ScopeConfig::default()
        };
        let pipeline = pipeline_for(EntityDescriptor::new(entity, fields), config)?;
        let ctx = QueryContext::anonymous(now).with_principal(principal, false);
        assert_missing_tenant(&pipeline.apply(pipeline.query(entity), &ctx), entity);
    }
}
