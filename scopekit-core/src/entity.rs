//! Entity type tags, capability flags and descriptors

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Well-known column names the built-in rules look for.
pub mod columns {
    pub const IS_ACTIVE: &str = "is_active";
    pub const IS_ENABLED: &str = "is_enabled";
    pub const IS_VISIBLE: &str = "is_visible";
    pub const IS_APPROVED: &str = "is_approved";
    pub const STATUS: &str = "status";
    pub const PUBLISHED_AT: &str = "published_at";
    pub const EXPIRES_AT: &str = "expires_at";
    pub const SCHEDULED_AT: &str = "scheduled_at";
    pub const STARTS_AT: &str = "starts_at";
    pub const ENDS_AT: &str = "ends_at";
    pub const TENANT_ID: &str = "tenant_id";
    pub const USER_ID: &str = "user_id";
    pub const CREATED_BY: &str = "created_by";
    pub const OWNER_ID: &str = "owner_id";
    pub const CUSTOMER_ID: &str = "customer_id";

    /// Activity flags in precedence order. Only the first present one is used.
    pub const ACTIVITY_FLAGS: [&str; 3] = [IS_ACTIVE, IS_ENABLED, IS_VISIBLE];

    /// Default ownership columns, in the order they are OR-ed.
    pub const DEFAULT_OWNERSHIP: [&str; 4] = [USER_ID, CREATED_BY, OWNER_ID, CUSTOMER_ID];
}

/// Entity type discriminator for the storefront domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Order,
    OrderItem,
    Invoice,
    Payment,
    Shipment,
    Campaign,
    Promotion,
    Coupon,
    Product,
    Category,
    Brand,
    Banner,
    Page,
    Post,
    Review,
    Customer,
    Address,
    Cart,
    Wishlist,
    Notification,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [EntityType; 20] = [
        EntityType::Order,
        EntityType::OrderItem,
        EntityType::Invoice,
        EntityType::Payment,
        EntityType::Shipment,
        EntityType::Campaign,
        EntityType::Promotion,
        EntityType::Coupon,
        EntityType::Product,
        EntityType::Category,
        EntityType::Brand,
        EntityType::Banner,
        EntityType::Page,
        EntityType::Post,
        EntityType::Review,
        EntityType::Customer,
        EntityType::Address,
        EntityType::Cart,
        EntityType::Wishlist,
        EntityType::Notification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Order => "order",
            EntityType::OrderItem => "order_item",
            EntityType::Invoice => "invoice",
            EntityType::Payment => "payment",
            EntityType::Shipment => "shipment",
            EntityType::Campaign => "campaign",
            EntityType::Promotion => "promotion",
            EntityType::Coupon => "coupon",
            EntityType::Product => "product",
            EntityType::Category => "category",
            EntityType::Brand => "brand",
            EntityType::Banner => "banner",
            EntityType::Page => "page",
            EntityType::Post => "post",
            EntityType::Review => "review",
            EntityType::Customer => "customer",
            EntityType::Address => "address",
            EntityType::Cart => "cart",
            EntityType::Wishlist => "wishlist",
            EntityType::Notification => "notification",
        }
    }

    /// Conventional table name: the plural of the type tag.
    pub fn default_table(self) -> String {
        match self {
            EntityType::Address => "addresses".to_string(),
            EntityType::Category => "categories".to_string(),
            other => format!("{}s", other.as_str()),
        }
    }

    /// Lifecycle family that decides which `status` values are visible.
    pub fn status_family(self) -> StatusFamily {
        match self {
            EntityType::Order | EntityType::Shipment => StatusFamily::Fulfilment,
            EntityType::Campaign | EntityType::Promotion | EntityType::Coupon => {
                StatusFamily::Promotion
            }
            _ => StatusFamily::Generic,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityType::ALL
            .into_iter()
            .find(|entity| entity.as_str() == needle)
            .ok_or_else(|| format!("unknown entity type: {}", s))
    }
}

/// Lifecycle families with their own status allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFamily {
    /// Orders and shipments moving through fulfilment.
    Fulfilment,
    /// Campaigns, promotions and coupons.
    Promotion,
    /// Anything without a dedicated list.
    Generic,
}

impl StatusFamily {
    pub fn allowed_statuses(self) -> &'static [&'static str] {
        match self {
            StatusFamily::Fulfilment => &[
                "pending",
                "confirmed",
                "processing",
                "shipped",
                "delivered",
                "completed",
            ],
            StatusFamily::Promotion => &["active", "running", "published"],
            StatusFamily::Generic => &["active", "published", "approved", "completed"],
        }
    }
}

bitflags! {
    /// Filtering capabilities an entity exposes, derived from its fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u16 {
        /// Has one of `is_active`, `is_enabled`, `is_visible`.
        const ACTIVITY = 1 << 0;
        const APPROVAL = 1 << 1;
        const STATUS = 1 << 2;
        const PUBLICATION = 1 << 3;
        const EXPIRY = 1 << 4;
        const SCHEDULE = 1 << 5;
        /// Has `starts_at` and/or `ends_at`.
        const ACTIVE_WINDOW = 1 << 6;
        const TENANT = 1 << 7;
        const OWNER = 1 << 8;

        const TEMPORAL = Self::PUBLICATION.bits()
            | Self::EXPIRY.bits()
            | Self::SCHEDULE.bits()
            | Self::ACTIVE_WINDOW.bits();
    }
}

impl Capabilities {
    /// Derive capabilities from a field set.
    ///
    /// Tenant and ownership columns are configurable, so they are passed in.
    pub fn detect<S: AsRef<str>>(
        fields: &BTreeSet<String>,
        tenant_column: &str,
        ownership_columns: &[S],
    ) -> Self {
        let has = |name: &str| fields.contains(name);
        let mut caps = Capabilities::empty();

        if columns::ACTIVITY_FLAGS.iter().any(|c| has(*c)) {
            caps |= Capabilities::ACTIVITY;
        }
        if has(columns::IS_APPROVED) {
            caps |= Capabilities::APPROVAL;
        }
        if has(columns::STATUS) {
            caps |= Capabilities::STATUS;
        }
        if has(columns::PUBLISHED_AT) {
            caps |= Capabilities::PUBLICATION;
        }
        if has(columns::EXPIRES_AT) {
            caps |= Capabilities::EXPIRY;
        }
        if has(columns::SCHEDULED_AT) {
            caps |= Capabilities::SCHEDULE;
        }
        if has(columns::STARTS_AT) || has(columns::ENDS_AT) {
            caps |= Capabilities::ACTIVE_WINDOW;
        }
        if has(tenant_column) {
            caps |= Capabilities::TENANT;
        }
        if ownership_columns.iter().any(|c| has(c.as_ref())) {
            caps |= Capabilities::OWNER;
        }
        caps
    }
}

/// Static description of an entity type's fields.
///
/// Built once per entity type and kept for the process lifetime; the schema
/// is not expected to change at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    /// Backing table name, defaults to the plural of the type tag.
    pub table: String,
    pub known_fields: BTreeSet<String>,
}

impl EntityDescriptor {
    pub fn new<I, S>(entity_type: EntityType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type,
            table: entity_type.default_table(),
            known_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.known_fields.contains(field)
    }

    pub fn capabilities<S: AsRef<str>>(
        &self,
        tenant_column: &str,
        ownership_columns: &[S],
    ) -> Capabilities {
        Capabilities::detect(&self.known_fields, tenant_column, ownership_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trips_through_str() {
        for entity in EntityType::ALL {
            let parsed: EntityType = entity.as_str().parse().expect("known type");
            assert_eq!(parsed, entity);
        }
        assert_eq!("Order-Item".parse::<EntityType>(), Ok(EntityType::OrderItem));
        assert!("spaceship".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_status_families() {
        assert_eq!(EntityType::Order.status_family(), StatusFamily::Fulfilment);
        assert_eq!(EntityType::Campaign.status_family(), StatusFamily::Promotion);
        assert_eq!(EntityType::Product.status_family(), StatusFamily::Generic);
        assert!(StatusFamily::Fulfilment.allowed_statuses().contains(&"shipped"));
        assert!(!StatusFamily::Fulfilment.allowed_statuses().contains(&"draft"));
    }

    #[test]
    fn test_capabilities_detect() {
        let fields: BTreeSet<String> = ["id", "is_enabled", "starts_at", "tenant_id", "created_by"]
            .into_iter()
            .map(String::from)
            .collect();
        let caps = Capabilities::detect(&fields, "tenant_id", &columns::DEFAULT_OWNERSHIP);
        assert!(caps.contains(Capabilities::ACTIVITY));
        assert!(caps.contains(Capabilities::ACTIVE_WINDOW));
        assert!(caps.contains(Capabilities::TENANT | Capabilities::OWNER));
        assert!(!caps.contains(Capabilities::STATUS));
        assert!(caps.intersects(Capabilities::TEMPORAL));
    }

    #[test]
    fn test_descriptor_table_defaults() {
        let desc = EntityDescriptor::new(EntityType::Category, ["id"]);
        assert_eq!(desc.table, "categories");
        let desc = EntityDescriptor::new(EntityType::Order, ["id"]).with_table("shop_orders");
        assert_eq!(desc.table, "shop_orders");
        assert!(desc.has_field("id"));
        assert!(!desc.has_field("status"));
    }
}
