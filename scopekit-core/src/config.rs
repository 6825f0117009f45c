//! Configuration for scope filtering

use crate::entity::columns;
use crate::sql::is_valid_identifier;
use crate::{ConfigError, EntityType, ScopeError, ScopeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// What a rule does when the context it needs is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Missing tenant/principal or an unknown entity degrades to "no filter".
    #[default]
    Permissive,
    /// The same conditions fail the query with an `IsolationError`.
    Strict,
}

impl IsolationMode {
    pub fn is_strict(self) -> bool {
        self == IsolationMode::Strict
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Permissive => f.write_str("permissive"),
            IsolationMode::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for IsolationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(IsolationMode::Permissive),
            "strict" => Ok(IsolationMode::Strict),
            other => Err(ConfigError::InvalidValue {
                field: "isolation_mode".to_string(),
                value: other.to_string(),
                reason: "expected 'permissive' or 'strict'".to_string(),
            }),
        }
    }
}

/// Scope filtering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    pub isolation_mode: IsolationMode,
    pub tenant_column: String,
    /// Candidate ownership columns, OR-ed in this order.
    pub ownership_columns: Vec<String>,
    pub privileged_roles: Vec<String>,
    pub tenant_session_key: String,
    pub tenant_request_param: String,
    /// Replacement status allow-lists for specific entity types.
    pub status_overrides: BTreeMap<EntityType, Vec<String>>,
    /// Warn when a tenant/ownership rule is skipped for lack of context.
    pub log_skipped_rules: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            isolation_mode: IsolationMode::Permissive,
            tenant_column: columns::TENANT_ID.to_string(),
            ownership_columns: columns::DEFAULT_OWNERSHIP
                .iter()
                .map(|c| c.to_string())
                .collect(),
            privileged_roles: vec!["admin".to_string(), "super_admin".to_string()],
            tenant_session_key: "tenant_id".to_string(),
            tenant_request_param: "tenant_id".to_string(),
            status_overrides: BTreeMap::new(),
            log_skipped_rules: true,
        }
    }
}

impl ScopeConfig {
    /// Build from defaults overlaid with environment variables.
    ///
    /// Environment variables:
    /// - `SCOPEKIT_ISOLATION_MODE`: `permissive` or `strict`
    /// - `SCOPEKIT_TENANT_COLUMN`: tenant column name
    /// - `SCOPEKIT_OWNERSHIP_COLUMNS`: comma-separated ownership columns
    /// - `SCOPEKIT_PRIVILEGED_ROLES`: comma-separated role names
    /// - `SCOPEKIT_LOG_SKIPPED_RULES`: `true`/`false`/`1`/`0`
    pub fn from_env() -> ScopeResult<Self> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("SCOPEKIT_ISOLATION_MODE") {
            config.isolation_mode = mode.parse()?;
        }
        if let Ok(column) = std::env::var("SCOPEKIT_TENANT_COLUMN") {
            config.tenant_column = column.trim().to_string();
        }
        if let Ok(list) = std::env::var("SCOPEKIT_OWNERSHIP_COLUMNS") {
            config.ownership_columns = split_list(&list);
        }
        if let Ok(list) = std::env::var("SCOPEKIT_PRIVILEGED_ROLES") {
            config.privileged_roles = split_list(&list);
        }
        if let Ok(flag) = std::env::var("SCOPEKIT_LOG_SKIPPED_RULES") {
            config.log_skipped_rules = parse_flag("log_skipped_rules", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> ScopeResult<Self> {
        let config: ScopeConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> ScopeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - tenant_column and every ownership column are SQL identifiers
    /// - ownership_columns is non-empty
    /// - session key and request param are non-empty
    /// - no status override list is empty
    pub fn validate(&self) -> ScopeResult<()> {
        check_identifier("tenant_column", &self.tenant_column)?;

        if self.ownership_columns.is_empty() {
            return Err(ScopeError::Config(ConfigError::MissingRequired {
                field: "ownership_columns".to_string(),
            }));
        }
        for column in &self.ownership_columns {
            check_identifier("ownership_columns", column)?;
        }

        if self.tenant_session_key.trim().is_empty() {
            return Err(invalid("tenant_session_key", "", "must not be empty"));
        }
        if self.tenant_request_param.trim().is_empty() {
            return Err(invalid("tenant_request_param", "", "must not be empty"));
        }

        for (entity, statuses) in &self.status_overrides {
            if statuses.is_empty() {
                return Err(invalid(
                    &format!("status_overrides.{}", entity),
                    "[]",
                    "allow-list must not be empty",
                ));
            }
        }

        Ok(())
    }

    pub fn is_privileged_role(&self, role: &str) -> bool {
        self.privileged_roles.iter().any(|r| r == role)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(field: &str, value: &str) -> ScopeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(field, value, "expected true, false, 1 or 0")),
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ScopeError {
    ScopeError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn check_identifier(field: &str, value: &str) -> ScopeResult<()> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(invalid(field, value, "must be a SQL identifier"))
    }
}

// =============================================================================
// TESTS
// =============================================================================
