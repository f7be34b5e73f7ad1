//! Credit record models

use praline_shared::{PlanTier, PrincipalId};
use serde::Serialize;
use time::OffsetDateTime;

use crate::catalog::Allowance;

/// Persisted credit state for one principal
///
/// One row per principal. `consumed` accumulates within the current period
/// and resets on rollover; `period_end` is the exclusive end of the period,
/// aligned to the first instant of a calendar month.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CreditRecord {
    pub principal_id: PrincipalId,
    pub tier: PlanTier,
    pub allowance: i64,
    pub consumed: i64,
    pub period_end: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CreditRecord {
    /// Remaining credits for the current period, clamped at zero
    ///
    /// A mid-period downgrade can leave `consumed` above the new allowance;
    /// the stored counter keeps its true value so a later upgrade restores
    /// the real remainder, but the reported figure never goes negative.
    pub fn remaining(&self) -> Allowance {
        if self.tier.is_unlimited() {
            Allowance::Unlimited
        } else {
            Allowance::Metered((self.allowance - self.consumed).max(0))
        }
    }
}

/// Point-in-time credit status for a principal
#[derive(Debug, Clone, Serialize)]
pub struct CreditStatus {
    pub tier: PlanTier,
    pub remaining: Allowance,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
}

impl From<&CreditRecord> for CreditStatus {
    fn from(record: &CreditRecord) -> Self {
        Self {
            tier: record.tier,
            remaining: record.remaining(),
            period_end: record.period_end,
        }
    }
}
