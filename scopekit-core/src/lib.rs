//! scopekit core - entity descriptors, predicates and query context
//!
//! Pure data layer shared by the rule crate: entity type tags and their
//! capabilities, the schema introspector, the predicate tree with SQL
//! rendering and in-memory evaluation, the per-operation query context,
//! configuration, and the error taxonomy. Filtering behaviour lives in
//! `scopekit-rules`.

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod filter;
pub mod identity;
pub mod query;
pub mod schema;
pub mod sql;
pub mod value;

pub use config::{IsolationMode, ScopeConfig};
pub use context::{Clock, FixedClock, QueryContext, SystemClock};
pub use entity::{columns, Capabilities, EntityDescriptor, EntityType, StatusFamily};
pub use error::{ConfigError, IsolationError, QueryError, ScopeError, ScopeResult};
pub use filter::{CompareOp, Predicate};
pub use identity::{PrincipalId, TenantId, Timestamp};
pub use query::FilteredQuery;
pub use schema::{CachedIntrospector, ColumnSource, EntityRegistry, SchemaIntrospector};
pub use sql::SqlFragment;
pub use value::{Row, Value};
