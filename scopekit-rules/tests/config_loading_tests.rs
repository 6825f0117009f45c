//! Loading registries and configuration from TOML files.

use scopekit_core::{
    ConfigError, EntityRegistry, EntityType, IsolationMode, SchemaIntrospector, ScopeConfig,
    ScopeError, ScopeResult,
};
use scopekit_rules::{FilterPipeline, RuleKind};
use scopekit_test_utils::fixtures::shopper;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

const REGISTRY: &str = r#"
[[entity]]
type = "order"
table = "shop_orders"
columns = ["id", "store_id", "status", "buyer_id"]

[[entity]]
type = "campaign"
columns = ["id", "store_id", "status", "starts_at", "ends_at"]
"#;

const CONFIG: &str = r#"
isolation_mode = "strict"
tenant_column = "store_id"
ownership_columns = ["buyer_id"]
privileged_roles = ["staff"]

[status_overrides]
campaign = ["live"]
"#;

#[test]
fn test_pipeline_from_files() -> ScopeResult<()> {
    let registry_file = write_temp(REGISTRY);
    let config_file = write_temp(CONFIG);

    let registry = EntityRegistry::from_path(registry_file.path())?;
    let config = ScopeConfig::from_path(config_file.path())?;
    assert_eq!(config.isolation_mode, IsolationMode::Strict);
    assert!(registry.has_field(EntityType::Order, "buyer_id"));

    let pipeline = FilterPipeline::for_registry(registry, config)?;
    assert_eq!(
        pipeline.registry().kinds_for(EntityType::Order),
        vec![RuleKind::Status, RuleKind::Tenant, RuleKind::Ownership]
    );

    let sql = pipeline.select(EntityType::Order, &shopper(5, 2))?;
    assert!(sql.sql.starts_with("SELECT * FROM \"shop_orders\" WHERE"));
    assert!(sql.sql.contains("\"store_id\" = $"));
    assert!(sql.sql.contains("\"buyer_id\" = $"));

    let sql = pipeline.select(EntityType::Campaign, &shopper(5, 2))?;
    assert!(sql.sql.contains("\"status\" IN ($1)"));
    Ok(())
}

#[test]
fn test_unknown_config_key_rejected() {
    let file = write_temp("isolation = \"strict\"\n");
    let err = ScopeConfig::from_path(file.path()).unwrap_err();
    assert!(matches!(err, ScopeError::Config(ConfigError::Parse { .. })));
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.toml");
    match EntityRegistry::from_path(&path) {
        Err(ScopeError::Config(ConfigError::Io { path: reported, .. })) => {
            assert!(reported.ends_with("absent.toml"));
        }
        other => panic!("Expected Io error, got: {:?}", other),
    }
}

#[test]
fn test_invalid_column_in_registry_rejected() {
    let file = write_temp("[[entity]]\ntype = \"order\"\ncolumns = [\"id; drop\"]\n");
    assert!(EntityRegistry::from_path(file.path()).is_err());
}
