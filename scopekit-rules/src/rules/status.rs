use super::{FilterRule, RuleEnv, RuleKind, RuleOutcome, SkipReason};
use scopekit_core::{
    columns, ConfigError, EntityType, FilteredQuery, Predicate, SchemaIntrospector, ScopeConfig,
    ScopeError, ScopeResult,
};
use std::collections::BTreeMap;

/// Entity-type keyed status allow-lists.
///
/// Built-in lists come from each type's [`scopekit_core::StatusFamily`];
/// configured overrides replace the list for one entity type. An empty
/// override never reaches the rule: it would render as `FALSE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusAllowList {
    overrides: BTreeMap<EntityType, Vec<String>>,
}

impl StatusAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides from `config`. Empty lists are dropped, so an unvalidated
    /// config falls back to the built-in list instead of hiding every row.
    pub fn from_config(config: &ScopeConfig) -> Self {
        let overrides = config
            .status_overrides
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(entity, list)| (*entity, list.clone()))
            .collect();
        Self { overrides }
    }

    pub fn with_override<I, S>(mut self, entity: EntityType, statuses: I) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = statuses.into_iter().map(Into::into).collect();
        if list.is_empty() {
            return Err(ScopeError::Config(ConfigError::InvalidValue {
                field: format!("status_overrides.{}", entity),
                value: "[]".to_string(),
                reason: "allow-list must not be empty".to_string(),
            }));
        }
        self.overrides.insert(entity, list);
        Ok(self)
    }

    pub fn allowed_for(&self, entity: EntityType) -> Vec<String> {
        match self.overrides.get(&entity) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => entity
                .status_family()
                .allowed_statuses()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn permits(&self, entity: EntityType, status: &str) -> bool {
        match self.overrides.get(&entity) {
            Some(list) if !list.is_empty() => list.iter().any(|s| s == status),
            _ => entity.status_family().allowed_statuses().contains(&status),
        }
    }
}

/// `column IN (allowed...)` with the allow-list chosen per entity type.
#[derive(Debug, Clone)]
pub struct ColumnSetMembershipRule {
    column: String,
    allow_list: StatusAllowList,
}

impl ColumnSetMembershipRule {
    /// Status whitelist on the `status` column.
    pub fn status(allow_list: StatusAllowList) -> Self {
        Self {
            column: columns::STATUS.to_string(),
            allow_list,
        }
    }

    pub fn allow_list(&self) -> &StatusAllowList {
        &self.allow_list
    }
}

impl FilterRule for ColumnSetMembershipRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Status
    }

    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool {
        schema.has_field(query.entity(), &self.column)
    }

    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome> {
        if !self.is_applicable(query, env.schema) {
            return Ok(RuleOutcome::skipped(SkipReason::NotApplicable));
        }
        let allowed = self.allow_list.allowed_for(query.entity());
        let added = query.and_where(Predicate::is_in(self.column.as_str(), allowed));
        Ok(RuleOutcome::Applied {
            predicates: usize::from(added),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scopekit_core::{EntityDescriptor, EntityRegistry, QueryContext, Row, Value};

    fn order_row(status: &str) -> Row {
        Row::from([("status".to_string(), Value::from(status))])
    }

    fn apply(rule: &ColumnSetMembershipRule, entity: EntityType) -> FilteredQuery {
        let schema = EntityRegistry::new()
            .with(EntityDescriptor::new(EntityType::Order, ["id", "status"]))
            .with(EntityDescriptor::new(EntityType::Campaign, ["id", "status"]))
            .with(EntityDescriptor::new(EntityType::Product, ["id", "status"]))
            .with(EntityDescriptor::new(EntityType::Customer, ["id"]));
        let ctx = QueryContext::anonymous(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let config = ScopeConfig::default();
        let env = RuleEnv {
            schema: &schema,
            context: &ctx,
            config: &config,
        };
        let mut query = FilteredQuery::new(entity);
        rule.apply(&mut query, &env).expect("status rule never fails");
        query
    }

    #[test]
    fn test_order_allows_shipped_not_draft() {
        let query = apply(
            &ColumnSetMembershipRule::status(StatusAllowList::new()),
            EntityType::Order,
        );
        assert!(query.matches(&order_row("shipped")));
        assert!(!query.matches(&order_row("draft")));
    }

    #[test]
    fn test_campaign_list_differs_from_order_list() {
        let query = apply(
            &ColumnSetMembershipRule::status(StatusAllowList::new()),
            EntityType::Campaign,
        );
        assert!(query.matches(&order_row("running")));
        assert!(!query.matches(&order_row("shipped")));
    }

    #[test]
    fn test_generic_fallback() {
        let list = StatusAllowList::new();
        assert!(list.permits(EntityType::Product, "active"));
        assert!(!list.permits(EntityType::Product, "archived"));
    }

    #[test]
    fn test_override_replaces_builtin_list() -> ScopeResult<()> {
        let list = StatusAllowList::new().with_override(EntityType::Product, ["featured"])?;
        assert_eq!(list.allowed_for(EntityType::Product), vec!["featured"]);
        assert!(!list.permits(EntityType::Product, "active"));
        assert!(list.permits(EntityType::Order, "pending"));

        let query = apply(&ColumnSetMembershipRule::status(list), EntityType::Product);
        assert!(query.matches(&order_row("featured")));
        Ok(())
    }

    #[test]
    fn test_empty_override_rejected() {
        let err = StatusAllowList::new()
            .with_override(EntityType::Product, Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ScopeError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "status_overrides.product"
        ));
    }

    #[test]
    fn test_empty_configured_override_falls_back_to_family() {
        let mut config = ScopeConfig::default();
        config.status_overrides.insert(EntityType::Product, Vec::new());
        let list = StatusAllowList::from_config(&config);
        assert!(list.permits(EntityType::Product, "active"));

        let query = apply(&ColumnSetMembershipRule::status(list), EntityType::Product);
        assert!(query.matches(&order_row("active")));
        assert!(!query.matches(&order_row("archived")));
    }

    #[test]
    fn test_entity_without_status_is_noop() {
        let query = apply(
            &ColumnSetMembershipRule::status(StatusAllowList::new()),
            EntityType::Customer,
        );
        assert!(query.is_unfiltered());
    }

    #[test]
    fn test_null_status_is_excluded() {
        let query = apply(
            &ColumnSetMembershipRule::status(StatusAllowList::new()),
            EntityType::Order,
        );
        assert!(!query.matches(&Row::new()));
    }
}
