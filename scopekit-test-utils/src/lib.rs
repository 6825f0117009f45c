//! scopekit Test Utilities
//!
//! Shared test infrastructure for the scopekit workspace:
//! - Proptest generators for ids, entity types, timestamps, contexts and rows
//! - The storefront fixture schema used by scenario tests
//! - Assertions for scoped query results

pub use scopekit_core::{
    columns, EntityDescriptor, EntityRegistry, EntityType, FilteredQuery, FixedClock,
    IsolationError, PrincipalId, QueryContext, Row, ScopeError, ScopeResult, TenantId, Timestamp,
    Value,
};

use chrono::{TimeZone, Utc};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for scopekit types.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Every column name any rule looks at, plus a couple of plain ones.
    pub const SCOPE_COLUMNS: [&str; 15] = [
        columns::IS_ACTIVE,
        columns::IS_ENABLED,
        columns::IS_VISIBLE,
        columns::IS_APPROVED,
        columns::STATUS,
        columns::PUBLISHED_AT,
        columns::EXPIRES_AT,
        columns::SCHEDULED_AT,
        columns::STARTS_AT,
        columns::ENDS_AT,
        columns::TENANT_ID,
        columns::USER_ID,
        columns::CREATED_BY,
        columns::OWNER_ID,
        columns::CUSTOMER_ID,
    ];

    pub const STATUSES: [&str; 12] = [
        "pending",
        "confirmed",
        "processing",
        "shipped",
        "delivered",
        "completed",
        "active",
        "running",
        "published",
        "approved",
        "draft",
        "cancelled",
    ];

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        (1i64..10_000).prop_map(TenantId::new)
    }

    pub fn arb_principal_id() -> impl Strategy<Value = PrincipalId> {
        (1i64..10_000).prop_map(PrincipalId::new)
    }

    pub fn arb_entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(EntityType::ALL.to_vec())
    }

    /// Timestamp between 2020 and 2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_status() -> impl Strategy<Value = String> {
        prop::sample::select(STATUSES.to_vec()).prop_map(str::to_string)
    }

    /// Any subset of [`SCOPE_COLUMNS`], always with `id`.
    pub fn arb_field_set() -> impl Strategy<Value = BTreeSet<String>> {
        prop::sample::subsequence(SCOPE_COLUMNS.to_vec(), 0..=SCOPE_COLUMNS.len()).prop_map(
            |cols| {
                std::iter::once("id")
                    .chain(cols)
                    .map(str::to_string)
                    .collect()
            },
        )
    }

    /// Field set with none of the configured ownership columns.
    pub fn arb_ownerless_field_set() -> impl Strategy<Value = BTreeSet<String>> {
        arb_field_set().prop_map(|mut fields| {
            for column in columns::DEFAULT_OWNERSHIP {
                fields.remove(column);
            }
            fields
        })
    }

    pub fn arb_descriptor() -> impl Strategy<Value = EntityDescriptor> {
        (arb_entity_type(), arb_field_set())
            .prop_map(|(entity, fields)| EntityDescriptor::new(entity, fields))
    }

    pub fn arb_query_context() -> impl Strategy<Value = QueryContext> {
        (
            proptest::option::of(arb_principal_id()),
            any::<bool>(),
            proptest::option::of(arb_tenant_id()),
            arb_timestamp(),
        )
            .prop_map(|(principal, privileged, tenant, now)| {
                let mut ctx = QueryContext::anonymous(now);
                if let Some(principal) = principal {
                    ctx = ctx.with_principal(principal, privileged);
                }
                if let Some(tenant) = tenant {
                    ctx = ctx.with_tenant(tenant);
                }
                ctx
            })
    }

    /// A plausible value for `column`, NULL included.
    pub fn arb_cell(column: &'static str) -> BoxedStrategy<Value> {
        match column {
            columns::IS_ACTIVE
            | columns::IS_ENABLED
            | columns::IS_VISIBLE
            | columns::IS_APPROVED => {
                prop_oneof![Just(Value::Null), any::<bool>().prop_map(Value::Bool)].boxed()
            }
            columns::STATUS => prop_oneof![Just(Value::Null), arb_status().prop_map(Value::Text)]
                .boxed(),
            columns::PUBLISHED_AT
            | columns::EXPIRES_AT
            | columns::SCHEDULED_AT
            | columns::STARTS_AT
            | columns::ENDS_AT => prop_oneof![
                Just(Value::Null),
                arb_timestamp().prop_map(Value::Timestamp)
            ]
            .boxed(),
            _ => prop_oneof![Just(Value::Null), (1i64..20).prop_map(Value::Int)].boxed(),
        }
    }

    /// A row holding a value for every column in `fields`.
    pub fn arb_row(fields: &BTreeSet<String>) -> BoxedStrategy<Row> {
        let cells: Vec<BoxedStrategy<(String, Value)>> = SCOPE_COLUMNS
            .iter()
            .filter(|c| fields.contains(**c))
            .map(|c| {
                let column = *c;
                arb_cell(column)
                    .prop_map(move |v| (column.to_string(), v))
                    .boxed()
            })
            .collect();
        cells
            .prop_map(|cells| cells.into_iter().collect::<Row>())
            .boxed()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use scopekit_core::Predicate;

    /// The instant every fixture context is evaluated at.
    pub fn reference_now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn fixed_clock() -> FixedClock {
        FixedClock(reference_now())
    }

    /// A storefront schema covering every rule family.
    ///
    /// `Address` and `Category` carry no scope columns at all; `Coupon` is
    /// deliberately left unregistered.
    pub fn storefront_registry() -> EntityRegistry {
        EntityRegistry::new()
            .with(EntityDescriptor::new(
                EntityType::Order,
                ["id", "tenant_id", "status", "user_id", "customer_id", "total"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Shipment,
                ["id", "tenant_id", "status", "created_by"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Campaign,
                ["id", "tenant_id", "status", "starts_at", "ends_at", "owner_id"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Promotion,
                ["id", "tenant_id", "is_enabled", "expires_at"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Product,
                ["id", "tenant_id", "is_active", "is_visible", "published_at", "name"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Banner,
                ["id", "is_visible", "scheduled_at", "ends_at"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Post,
                ["id", "status", "published_at", "created_by"],
            ))
            .with(EntityDescriptor::new(
                EntityType::Review,
                ["id", "tenant_id", "is_approved", "user_id"],
            ))
            .with(EntityDescriptor::new(EntityType::Address, ["id", "street", "city"]))
            .with(EntityDescriptor::new(EntityType::Category, ["id", "name", "slug"]))
    }

    pub fn anonymous() -> QueryContext {
        QueryContext::anonymous(reference_now())
    }

    /// Non-privileged principal within a tenant.
    pub fn shopper(principal: i64, tenant: i64) -> QueryContext {
        anonymous()
            .with_principal(PrincipalId::new(principal), false)
            .with_tenant(TenantId::new(tenant))
    }

    /// Privileged principal within a tenant.
    pub fn admin(principal: i64, tenant: i64) -> QueryContext {
        anonymous()
            .with_principal(PrincipalId::new(principal), true)
            .with_tenant(TenantId::new(tenant))
    }

    /// Row builder.
    #[derive(Debug, Clone, Default)]
    pub struct RowBuilder {
        row: Row,
    }

    impl RowBuilder {
        pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.row.insert(column.to_string(), value.into());
            self
        }

        pub fn null(self, column: &str) -> Self {
            self.set(column, Value::Null)
        }

        pub fn build(self) -> Row {
            self.row
        }
    }

    pub fn row() -> RowBuilder {
        RowBuilder::default()
    }

    /// Predicates of `query` that mention `column`.
    pub fn predicates_on<'a>(query: &'a FilteredQuery, column: &str) -> Vec<&'a Predicate> {
        query
            .predicates()
            .iter()
            .filter(|p| p.columns().contains(&column))
            .collect()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for scoped query results.

    use super::*;

    #[track_caller]
    pub fn assert_unfiltered(query: &FilteredQuery) {
        assert!(
            query.is_unfiltered(),
            "Expected no predicates on {}, got: {:?}",
            query.entity(),
            query.predicates()
        );
    }

    #[track_caller]
    pub fn assert_missing_tenant<T: std::fmt::Debug>(result: &ScopeResult<T>, entity: EntityType) {
        match result {
            Err(ScopeError::Isolation(IsolationError::MissingTenant { entity: e }))
                if *e == entity => {}
            other => panic!("Expected MissingTenant for {}, got: {:?}", entity, other),
        }
    }

    #[track_caller]
    pub fn assert_missing_principal<T: std::fmt::Debug>(
        result: &ScopeResult<T>,
        entity: EntityType,
    ) {
        match result {
            Err(ScopeError::Isolation(IsolationError::MissingPrincipal { entity: e }))
                if *e == entity => {}
            other => panic!("Expected MissingPrincipal for {}, got: {:?}", entity, other),
        }
    }

    /// Assert no row in `rows` passes `query`.
    #[track_caller]
    pub fn assert_excludes_all(query: &FilteredQuery, rows: &[Row]) {
        let kept = query.filter_rows(rows);
        assert!(kept.is_empty(), "Expected zero rows, kept: {:?}", kept);
    }
}
