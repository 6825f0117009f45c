//! Error types for scopekit operations

use crate::EntityType;
use thiserror::Error;

/// Isolation errors.
///
/// Only produced in strict isolation mode; permissive mode degrades the same
/// conditions to "no filter".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IsolationError {
    #[error("No tenant context available for tenant-scoped {entity}")]
    MissingTenant { entity: EntityType },

    #[error("No acting principal available for owner-scoped {entity}")]
    MissingPrincipal { entity: EntityType },

    #[error("Entity type {entity} is not registered with the schema")]
    UnknownEntity { entity: EntityType },
}

/// Query construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid SQL identifier: {ident:?}")]
    InvalidIdentifier { ident: String },

    #[error("Rule {rule} was built without candidate columns")]
    EmptyColumnSet { rule: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all scopekit errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Isolation error: {0}")]
    Isolation(#[from] IsolationError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for scopekit operations.
pub type ScopeResult<T> = Result<T, ScopeError>;

// =============================================================================
// TESTS
// =============================================================================
