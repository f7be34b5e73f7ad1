//! Persistence contract for credit records

use async_trait::async_trait;
use praline_shared::{PlanTier, PrincipalId};
use time::OffsetDateTime;

use crate::error::CreditsResult;
use crate::record::CreditRecord;

/// Outcome of an atomic guarded increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// The counter was incremented; holds the post-increment value
    Incremented { consumed: i64 },
    /// Guard failed: consumed had already reached the cap
    Denied,
    /// No record exists for the principal
    Missing,
}

/// Durable store for credit records
///
/// Implementations must apply each mutation as a single atomic conditional
/// update at record granularity. The engine relies on this for its
/// check-then-act consume path: two concurrent consumers of the last credit
/// must resolve to exactly one grant, even across processes.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Load the record for a principal, if one exists
    async fn load(&self, principal: PrincipalId) -> CreditsResult<Option<CreditRecord>>;

    /// Insert `record` unless the principal already has one; returns the
    /// stored record either way
    async fn create_if_absent(&self, record: CreditRecord) -> CreditsResult<CreditRecord>;

    /// Replace the record only if its stored period boundary still equals
    /// `expected_period_end`; returns whether the replace applied
    async fn replace_if_period_matches(
        &self,
        record: &CreditRecord,
        expected_period_end: OffsetDateTime,
    ) -> CreditsResult<bool>;

    /// Set tier and allowance in one update, leaving consumed and the
    /// period boundary untouched; returns the updated record
    async fn update_tier(
        &self,
        principal: PrincipalId,
        tier: PlanTier,
        allowance: i64,
    ) -> CreditsResult<Option<CreditRecord>>;

    /// Increment consumed by one if and only if it is currently below
    /// `guard_max`
    async fn increment_consumed(
        &self,
        principal: PrincipalId,
        guard_max: i64,
    ) -> CreditsResult<IncrementOutcome>;
}
