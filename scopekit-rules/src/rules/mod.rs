//! Filter rules
//!
//! Each rule checks whether it applies to the entity (via the schema
//! introspector) and, if so, ANDs its predicates onto the query. Rules never
//! talk to each other; their contributions are combined only through the
//! query's AND-list.

mod equality;
mod ownership;
mod status;
mod tenant;
mod window;

pub use equality::{ColumnEqualityRule, Precedence};
pub use ownership::OwnershipRule;
pub use status::{ColumnSetMembershipRule, StatusAllowList};
pub use tenant::TenantRule;
pub use window::{BoundSemantics, DateWindowRule, WindowBound};

use scopekit_core::{FilteredQuery, QueryContext, SchemaIntrospector, ScopeConfig, ScopeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule family identifier, also the handle for per-query opt-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Active,
    Approved,
    Status,
    DateWindow,
    Tenant,
    Ownership,
}

impl RuleKind {
    pub const ALL: [RuleKind; 6] = [
        RuleKind::Active,
        RuleKind::Approved,
        RuleKind::Status,
        RuleKind::DateWindow,
        RuleKind::Tenant,
        RuleKind::Ownership,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Active => "active",
            RuleKind::Approved => "approved",
            RuleKind::Status => "status",
            RuleKind::DateWindow => "date_window",
            RuleKind::Tenant => "tenant",
            RuleKind::Ownership => "ownership",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a rule contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// None of the rule's candidate fields exist on the entity.
    NotApplicable,
    /// Acting principal is privileged.
    PrivilegedBypass,
    /// No tenant could be resolved for this operation.
    NoTenant,
    /// No acting principal for this operation.
    NoPrincipal,
    /// Caller opted out of the rule for this query.
    OptedOut,
}

impl SkipReason {
    /// Skips caused by missing request context rather than by schema.
    pub fn is_missing_context(self) -> bool {
        matches!(self, SkipReason::NoTenant | SkipReason::NoPrincipal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Number of new predicates ANDed onto the query. Zero when the same
    /// predicates were already present.
    Applied { predicates: usize },
    Skipped { reason: SkipReason },
}

impl RuleOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        RuleOutcome::Skipped { reason }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RuleOutcome::Applied { .. })
    }
}

/// Everything a rule may read while applying.
#[derive(Clone, Copy)]
pub struct RuleEnv<'a> {
    pub schema: &'a dyn SchemaIntrospector,
    pub context: &'a QueryContext,
    pub config: &'a ScopeConfig,
}

/// A single global filter.
///
/// Implementations are immutable after construction.
pub trait FilterRule: Send + Sync + fmt::Debug {
    fn kind(&self) -> RuleKind;

    /// Whether any of the rule's candidate fields exist on the entity.
    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool;

    /// AND this rule's predicates onto `query`.
    ///
    /// In permissive mode this never fails; strict mode may return an
    /// `IsolationError` when required context is absent.
    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome>;
}

/// Log a context-driven skip, honouring `log_skipped_rules`.
pub(crate) fn log_missing_context(
    env: &RuleEnv<'_>,
    kind: RuleKind,
    query: &FilteredQuery,
    reason: SkipReason,
) {
    if env.config.log_skipped_rules {
        tracing::warn!(
            entity = %query.entity(),
            rule = %kind,
            reason = ?reason,
            "Scope rule skipped for lack of context; isolation not enforced"
        );
    }
}
