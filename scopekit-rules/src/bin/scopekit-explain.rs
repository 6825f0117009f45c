/// Scope explainer - shows the scoped SELECT for one entity and context
///
/// Usage: scopekit-explain --registry <file> --entity <type> [options]

use scopekit_core::{
    EntityRegistry, EntityType, PrincipalId, ScopeConfig, ScopeResult, SystemClock, TenantId,
};
use scopekit_rules::telemetry::init_tracing;
use scopekit_rules::{
    ApplyOptions, AuthenticatedPrincipal, ContextResolver, FilterPipeline, RequestContext,
};
use std::path::PathBuf;

const USAGE: &str = "\
Usage: scopekit-explain --registry <file> --entity <type> [options]

Options:
  --config <file>        Scope config TOML (default: SCOPEKIT_* environment)
  --user <id>            Authenticated principal id
  --tenant <id>          The principal's own tenant (requires --user)
  --role <name>          Principal role, repeatable
  --session-tenant <id>  Tenant id stored in the session
  --param-tenant <id>    Tenant id passed as a request parameter
  --json                 Emit JSON instead of text";

#[derive(Debug, Default)]
struct Args {
    registry: Option<PathBuf>,
    entity: Option<String>,
    config: Option<PathBuf>,
    user: Option<PrincipalId>,
    tenant: Option<TenantId>,
    roles: Vec<String>,
    session_tenant: Option<String>,
    param_tenant: Option<String>,
    json: bool,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut raw = raw.into_iter();
    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| raw.next().ok_or_else(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--registry" => args.registry = Some(PathBuf::from(value("--registry")?)),
            "--entity" => args.entity = Some(value("--entity")?),
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--user" => {
                let v = value("--user")?;
                args.user = Some(v.parse().map_err(|e| format!("--user {}: {}", v, e))?);
            }
            "--tenant" => {
                let v = value("--tenant")?;
                args.tenant = Some(v.parse().map_err(|e| format!("--tenant {}: {}", v, e))?);
            }
            "--role" => args.roles.push(value("--role")?),
            "--session-tenant" => args.session_tenant = Some(value("--session-tenant")?),
            "--param-tenant" => args.param_tenant = Some(value("--param-tenant")?),
            "--json" => args.json = true,
            "-h" | "--help" => return Err(String::new()),
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    if args.tenant.is_some() && args.user.is_none() {
        return Err("--tenant requires --user".to_string());
    }
    Ok(args)
}

fn request_from(args: &Args, config: &ScopeConfig) -> RequestContext {
    let mut request = RequestContext::anonymous();
    if let Some(user) = args.user {
        let mut principal = AuthenticatedPrincipal::new(user);
        principal.tenant_id = args.tenant;
        principal.roles = args.roles.clone();
        request = request.with_principal(principal);
    }
    if let Some(raw) = &args.session_tenant {
        request = request.with_session(config.tenant_session_key.as_str(), raw.as_str());
    }
    if let Some(raw) = &args.param_tenant {
        request = request.with_param(config.tenant_request_param.as_str(), raw.as_str());
    }
    request
}

fn run(args: Args) -> Result<(), String> {
    let registry_path = args.registry.as_ref().ok_or("--registry is required")?;
    let entity: EntityType = args
        .entity
        .as_deref()
        .ok_or("--entity is required")?
        .parse()?;

    let load = || -> ScopeResult<_> {
        let registry = EntityRegistry::from_path(registry_path)?;
        let config = match &args.config {
            Some(path) => ScopeConfig::from_path(path)?,
            None => ScopeConfig::from_env()?,
        };
        FilterPipeline::for_registry(registry, config)
    };
    let pipeline = load().map_err(|e| e.to_string())?;

    let request = request_from(&args, pipeline.config());
    let ctx = ContextResolver::from_config(pipeline.config()).resolve(&request, &SystemClock);
    let (query, report) = pipeline
        .apply_with_report(pipeline.query(entity), &ctx, &ApplyOptions::default())
        .map_err(|e| e.to_string())?;
    let table = pipeline
        .schema()
        .get(entity)
        .map(|d| d.table.clone())
        .unwrap_or_else(|| entity.default_table());
    let sql = query.to_select(&table).map_err(|e| e.to_string())?;

    if args.json {
        let out = serde_json::json!({
            "context": ctx,
            "sql": sql.sql,
            "params": sql.params,
            "report": report,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        println!("{}", text);
        return Ok(());
    }

    println!("entity:    {}", entity);
    println!(
        "principal: {}",
        ctx.current_principal_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    );
    println!("privileged: {}", ctx.is_privileged);
    println!(
        "tenant:    {}",
        ctx.current_tenant_id
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!();
    println!("{}", sql.sql);
    for (idx, param) in sql.params.iter().enumerate() {
        println!("  ${} = {}", idx + 1, param);
    }
    println!();
    if !report.entity_known {
        println!("entity is not registered; no scopes applied");
    }
    for rule in &report.rules {
        println!("  {:<12} {:?}", rule.rule.as_str(), rule.outcome);
    }
    Ok(())
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {}", msg);
                eprintln!();
            }
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_tracing(args.json) {
        eprintln!("warning: {}", e);
    }

    if let Err(msg) = run(args) {
        eprintln!("error: {}", msg);
        std::process::exit(1);
    }
}
