//! Schema introspection
//!
//! Answers "does entity type T have field F?". Unknown entity types answer
//! `false` for every field.

use crate::sql::is_valid_identifier;
use crate::{ConfigError, EntityDescriptor, EntityType, ScopeError, ScopeResult};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Field-existence lookup used by every rule.
///
/// Implementations must be deterministic for a given `(entity, field)` pair
/// for the life of the process.
pub trait SchemaIntrospector: Send + Sync {
    fn has_field(&self, entity: EntityType, field: &str) -> bool;

    /// Whether the entity type is known at all.
    fn knows_entity(&self, entity: EntityType) -> bool;

    /// Backing table for the entity, when known.
    fn table_name(&self, entity: EntityType) -> Option<String> {
        let _ = entity;
        None
    }
}

impl<T: SchemaIntrospector + ?Sized> SchemaIntrospector for Arc<T> {
    fn has_field(&self, entity: EntityType, field: &str) -> bool {
        (**self).has_field(entity, field)
    }

    fn knows_entity(&self, entity: EntityType) -> bool {
        (**self).knows_entity(entity)
    }

    fn table_name(&self, entity: EntityType) -> Option<String> {
        (**self).table_name(entity)
    }
}

// ============================================================================
// STATIC REGISTRY
// ============================================================================

/// Load-time registry of entity descriptors.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    descriptors: HashMap<EntityType, EntityDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    entity: Vec<RegistryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryEntry {
    #[serde(rename = "type")]
    entity_type: EntityType,
    table: Option<String>,
    columns: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a descriptor.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> &mut Self {
        self.descriptors.insert(descriptor.entity_type, descriptor);
        self
    }

    pub fn with(mut self, descriptor: EntityDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, entity: EntityType) -> Option<&EntityDescriptor> {
        self.descriptors.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered descriptors, ordered by entity type.
    pub fn descriptors(&self) -> Vec<&EntityDescriptor> {
        let mut out: Vec<&EntityDescriptor> = self.descriptors.values().collect();
        out.sort_by_key(|d| d.entity_type);
        out
    }

    /// Parse a registry from TOML:
    ///
    /// ```toml
    /// [[entity]]
    /// type = "order"
    /// table = "orders"          # optional
    /// columns = ["id", "tenant_id", "status"]
    /// ```
    pub fn from_toml_str(contents: &str) -> ScopeResult<Self> {
        let file: RegistryFile = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let mut registry = Self::new();
        for entry in file.entity {
            if registry.descriptors.contains_key(&entry.entity_type) {
                return Err(ScopeError::Config(ConfigError::InvalidValue {
                    field: "entity.type".to_string(),
                    value: entry.entity_type.to_string(),
                    reason: "declared more than once".to_string(),
                }));
            }
            for column in &entry.columns {
                if !is_valid_identifier(column) {
                    return Err(ScopeError::Config(ConfigError::InvalidValue {
                        field: format!("entity.{}.columns", entry.entity_type),
                        value: column.clone(),
                        reason: "must be a SQL identifier".to_string(),
                    }));
                }
            }
            let mut descriptor = EntityDescriptor::new(entry.entity_type, entry.columns);
            if let Some(table) = entry.table {
                if !is_valid_identifier(&table) {
                    return Err(ScopeError::Config(ConfigError::InvalidValue {
                        field: format!("entity.{}.table", entry.entity_type),
                        value: table,
                        reason: "must be a SQL identifier".to_string(),
                    }));
                }
                descriptor = descriptor.with_table(table);
            }
            registry.register(descriptor);
        }

        tracing::debug!(entities = registry.len(), "Loaded entity registry");
        Ok(registry)
    }

    pub fn from_path(path: &Path) -> ScopeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }
}

impl SchemaIntrospector for EntityRegistry {
    fn has_field(&self, entity: EntityType, field: &str) -> bool {
        self.descriptors
            .get(&entity)
            .is_some_and(|d| d.has_field(field))
    }

    fn knows_entity(&self, entity: EntityType) -> bool {
        self.descriptors.contains_key(&entity)
    }

    fn table_name(&self, entity: EntityType) -> Option<String> {
        self.descriptors.get(&entity).map(|d| d.table.clone())
    }
}

// ============================================================================
// CACHED LIVE LOOKUP
// ============================================================================

/// A live column listing, e.g. backed by `information_schema.columns`.
pub trait ColumnSource: Send + Sync {
    /// Columns of the entity's table, or `None` if the table does not exist.
    fn columns(&self, entity: EntityType) -> Option<BTreeSet<String>>;
}

impl<F> ColumnSource for F
where
    F: Fn(EntityType) -> Option<BTreeSet<String>> + Send + Sync,
{
    fn columns(&self, entity: EntityType) -> Option<BTreeSet<String>> {
        self(entity)
    }
}

/// Memoises a [`ColumnSource`] per entity type.
///
/// Concurrent first lookups may both hit the source; the results are
/// identical, so whichever insert lands last is fine.
pub struct CachedIntrospector<S: ColumnSource> {
    source: S,
    cache: DashMap<EntityType, Option<Arc<BTreeSet<String>>>>,
}

impl<S: ColumnSource> CachedIntrospector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    fn lookup(&self, entity: EntityType) -> Option<Arc<BTreeSet<String>>> {
        if let Some(hit) = self.cache.get(&entity) {
            return hit.value().clone();
        }
        let loaded = self.source.columns(entity).map(Arc::new);
        if loaded.is_none() {
            tracing::debug!(entity = %entity, "Column source has no table for entity");
        }
        self.cache.insert(entity, loaded.clone());
        loaded
    }

    /// Number of entity types currently cached.
    pub fn cached_entities(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached listing (e.g. after a migration).
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<S: ColumnSource> SchemaIntrospector for CachedIntrospector<S> {
    fn has_field(&self, entity: EntityType, field: &str) -> bool {
        self.lookup(entity).is_some_and(|cols| cols.contains(field))
    }

    fn knows_entity(&self, entity: EntityType) -> bool {
        self.lookup(entity).is_some()
    }
}
