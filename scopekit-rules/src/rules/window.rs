use super::{FilterRule, RuleEnv, RuleKind, RuleOutcome, SkipReason};
use scopekit_core::{columns, FilteredQuery, Predicate, SchemaIntrospector, ScopeResult, Timestamp};

/// Comparison semantics of one temporal gating column against "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSemantics {
    /// Not null and `<= now` (published).
    SetAndNotAfter,
    /// Null or `> now` (not yet expired).
    UnsetOrAfter,
    /// Null or `<= now` (scheduled / started).
    UnsetOrNotAfter,
    /// Null or `>= now` (not yet ended).
    UnsetOrNotBefore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBound {
    pub column: String,
    pub semantics: BoundSemantics,
}

impl WindowBound {
    pub fn new(column: impl Into<String>, semantics: BoundSemantics) -> Self {
        Self {
            column: column.into(),
            semantics,
        }
    }

    pub fn predicate(&self, now: Timestamp) -> Predicate {
        let column = self.column.as_str();
        match self.semantics {
            BoundSemantics::SetAndNotAfter => Predicate::all(vec![
                Predicate::is_not_null(column),
                Predicate::lte(column, now),
            ]),
            BoundSemantics::UnsetOrAfter => {
                Predicate::any(vec![Predicate::is_null(column), Predicate::gt(column, now)])
            }
            BoundSemantics::UnsetOrNotAfter => {
                Predicate::any(vec![Predicate::is_null(column), Predicate::lte(column, now)])
            }
            BoundSemantics::UnsetOrNotBefore => {
                Predicate::any(vec![Predicate::is_null(column), Predicate::gte(column, now)])
            }
        }
    }
}

/// Date-range gating. Every present bound applies, AND-combined.
#[derive(Debug, Clone)]
pub struct DateWindowRule {
    bounds: Vec<WindowBound>,
}

impl DateWindowRule {
    pub fn new(bounds: Vec<WindowBound>) -> Self {
        Self { bounds }
    }

    /// `published_at`, `expires_at`, `scheduled_at`, `starts_at`, `ends_at`.
    pub fn standard() -> Self {
        Self::new(vec![
            WindowBound::new(columns::PUBLISHED_AT, BoundSemantics::SetAndNotAfter),
            WindowBound::new(columns::EXPIRES_AT, BoundSemantics::UnsetOrAfter),
            WindowBound::new(columns::SCHEDULED_AT, BoundSemantics::UnsetOrNotAfter),
            WindowBound::new(columns::STARTS_AT, BoundSemantics::UnsetOrNotAfter),
            WindowBound::new(columns::ENDS_AT, BoundSemantics::UnsetOrNotBefore),
        ])
    }

    pub fn bounds(&self) -> &[WindowBound] {
        &self.bounds
    }
}

impl FilterRule for DateWindowRule {
    fn kind(&self) -> RuleKind {
        RuleKind::DateWindow
    }

    fn is_applicable(&self, query: &FilteredQuery, schema: &dyn SchemaIntrospector) -> bool {
        self.bounds
            .iter()
            .any(|b| schema.has_field(query.entity(), &b.column))
    }

    fn apply(&self, query: &mut FilteredQuery, env: &RuleEnv<'_>) -> ScopeResult<RuleOutcome> {
        let entity = query.entity();
        let mut matched = false;
        let mut added = 0;
        for bound in &self.bounds {
            if !env.schema.has_field(entity, &bound.column) {
                continue;
            }
            matched = true;
            if query.and_where(bound.predicate(env.context.now)) {
                added += 1;
            }
        }
        if !matched {
            return Ok(RuleOutcome::skipped(SkipReason::NotApplicable));
        }
        Ok(RuleOutcome::Applied { predicates: added })
    }
}
