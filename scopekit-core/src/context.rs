//! Per-operation query context and clock abstraction

use crate::{PrincipalId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Source of "now" for date-window predicates.
///
/// Injected so window checks are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// ============================================================================
// QUERY CONTEXT
// ============================================================================

/// Everything a rule may consult while filtering one query.
///
/// Built fresh for each operation and dropped afterwards; never cache one
/// across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub current_principal_id: Option<PrincipalId>,
    /// Privileged principals bypass ownership filtering.
    pub is_privileged: bool,
    pub current_tenant_id: Option<TenantId>,
    /// Evaluation instant for date-window rules.
    pub now: Timestamp,
}

impl QueryContext {
    /// No principal, no tenant.
    pub fn anonymous(now: Timestamp) -> Self {
        Self {
            current_principal_id: None,
            is_privileged: false,
            current_tenant_id: None,
            now,
        }
    }

    /// Context with the instant taken from `clock`.
    pub fn at(clock: &dyn Clock) -> Self {
        Self::anonymous(clock.now())
    }

    pub fn with_principal(mut self, principal: PrincipalId, is_privileged: bool) -> Self {
        self.current_principal_id = Some(principal);
        self.is_privileged = is_privileged;
        self
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.current_tenant_id = Some(tenant);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.current_principal_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_fixed_clock_is_stable() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = FixedClock(ts);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(QueryContext::at(&clock).now, ts);
    }

    #[test]
    fn test_context_builders() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ctx = QueryContext::anonymous(ts);
        assert!(ctx.is_anonymous());
        assert!(!ctx.is_privileged);

        let ctx = ctx
            .with_principal(PrincipalId::new(4), true)
            .with_tenant(TenantId::new(9));
        assert_eq!(ctx.current_principal_id, Some(PrincipalId::new(4)));
        assert_eq!(ctx.current_tenant_id, Some(TenantId::new(9)));
        assert!(ctx.is_privileged);
    }
}
