//! scopekit rules - global query scopes
//!
//! Resolves the acting tenant and principal for an operation, then ANDs the
//! applicable visibility rules onto a [`scopekit_core::FilteredQuery`]:
//! active/enabled/visible, approved, per-type status allow-lists, date
//! windows, tenant isolation, and ownership (bypassed by privileged
//! principals).
//!
//! ```ignore
//! let pipeline = FilterPipeline::for_registry(registry, ScopeConfig::from_env()?)?;
//! let ctx = ContextResolver::from_config(pipeline.config()).resolve(&request, &SystemClock);
//! let query = pipeline.apply(pipeline.query(EntityType::Order), &ctx)?;
//! ```

pub mod composer;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod telemetry;

pub use pipeline::{
    required_capabilities, ApplyOptions, FilterPipeline, RuleReport, ScopeRegistry, ScopeReport,
};
pub use resolver::{
    AuthenticatedPrincipal, ContextResolver, ContextTenantResolver, PrincipalResolver,
    RequestContext, ResolvedPrincipal, RolePrincipalResolver, TenantResolver,
};
pub use rules::{
    BoundSemantics, ColumnEqualityRule, ColumnSetMembershipRule, DateWindowRule, FilterRule,
    OwnershipRule, Precedence, RuleEnv, RuleKind, RuleOutcome, SkipReason, StatusAllowList,
    TenantRule, WindowBound,
};
