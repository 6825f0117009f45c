//! Tenant and principal resolution
//!
//! Turns the host application's request context into a [`QueryContext`].
//! The tenant is taken from, in order: the authenticated principal's own
//! tenant, the session, the request parameters. The first source that holds
//! a parseable id wins.

use scopekit_core::{Clock, PrincipalId, QueryContext, ScopeConfig, TenantId};
use std::collections::HashMap;

/// The authenticated user, as established by the host's auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub id: PrincipalId,
    /// The principal's own tenant, if the account is tenant-bound.
    pub tenant_id: Option<TenantId>,
    pub roles: Vec<String>,
}

impl AuthenticatedPrincipal {
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            tenant_id: None,
            roles: Vec::new(),
        }
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant_id = Some(tenant);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Request-scoped inputs to resolution.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<AuthenticatedPrincipal>,
    pub session: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

impl RequestContext {
    /// No principal, empty session, no parameters.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: AuthenticatedPrincipal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_session(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Determines the active tenant for an operation.
pub trait TenantResolver: Send + Sync {
    /// `None` when no tenant context exists; the tenant rule then adds nothing.
    fn resolve_tenant(&self, request: &RequestContext) -> Option<TenantId>;
}

/// The acting principal and whether ownership filtering is bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrincipal {
    pub id: PrincipalId,
    pub is_privileged: bool,
}

/// Determines the acting principal for an operation.
pub trait PrincipalResolver: Send + Sync {
    fn resolve_principal(&self, request: &RequestContext) -> Option<ResolvedPrincipal>;
}

/// Principal tenant, then session key, then request parameter.
#[derive(Debug, Clone)]
pub struct ContextTenantResolver {
    session_key: String,
    request_param: String,
}

impl ContextTenantResolver {
    pub fn new(session_key: impl Into<String>, request_param: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            request_param: request_param.into(),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(
            config.tenant_session_key.as_str(),
            config.tenant_request_param.as_str(),
        )
    }
}

impl Default for ContextTenantResolver {
    fn default() -> Self {
        Self::from_config(&ScopeConfig::default())
    }
}

impl TenantResolver for ContextTenantResolver {
    fn resolve_tenant(&self, request: &RequestContext) -> Option<TenantId> {
        if let Some(tenant) = request.principal.as_ref().and_then(|p| p.tenant_id) {
            return Some(tenant);
        }
        parse_tenant("session", &self.session_key, request.session.get(&self.session_key))
            .or_else(|| {
                parse_tenant(
                    "request",
                    &self.request_param,
                    request.params.get(&self.request_param),
                )
            })
    }
}

/// Unparseable values are logged and treated as absent.
fn parse_tenant(source: &str, key: &str, raw: Option<&String>) -> Option<TenantId> {
    let raw = raw?;
    match raw.parse::<TenantId>() {
        Ok(tenant) => Some(tenant),
        Err(e) => {
            tracing::warn!(
                source = source,
                key = key,
                value = %raw,
                error = %e,
                "Ignoring unparseable tenant id"
            );
            None
        }
    }
}

/// Privileged when the principal holds any configured privileged role.
#[derive(Debug, Clone)]
pub struct RolePrincipalResolver {
    privileged_roles: Vec<String>,
}

impl RolePrincipalResolver {
    pub fn new<I, S>(privileged_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            privileged_roles: privileged_roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.privileged_roles.iter().cloned())
    }
}

impl PrincipalResolver for RolePrincipalResolver {
    fn resolve_principal(&self, request: &RequestContext) -> Option<ResolvedPrincipal> {
        let principal = request.principal.as_ref()?;
        let is_privileged = self
            .privileged_roles
            .iter()
            .any(|role| principal.has_role(role));
        Some(ResolvedPrincipal {
            id: principal.id,
            is_privileged,
        })
    }
}

/// Bundles both resolvers into one [`QueryContext`] factory.
pub struct ContextResolver {
    tenants: Box<dyn TenantResolver>,
    principals: Box<dyn PrincipalResolver>,
}

impl ContextResolver {
    pub fn new(
        tenants: impl TenantResolver + 'static,
        principals: impl PrincipalResolver + 'static,
    ) -> Self {
        Self {
            tenants: Box::new(tenants),
            principals: Box::new(principals),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(
            ContextTenantResolver::from_config(config),
            RolePrincipalResolver::from_config(config),
        )
    }

    /// Snapshot principal, privilege, tenant and `now` for one operation.
    pub fn resolve(&self, request: &RequestContext, clock: &dyn Clock) -> QueryContext {
        let mut ctx = QueryContext::at(clock);
        if let Some(principal) = self.principals.resolve_principal(request) {
            ctx = ctx.with_principal(principal.id, principal.is_privileged);
        }
        if let Some(tenant) = self.tenants.resolve_tenant(request) {
            ctx = ctx.with_tenant(tenant);
        }
        ctx
    }
}

impl std::fmt::Debug for ContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextResolver").finish_non_exhaustive()
    }
}
