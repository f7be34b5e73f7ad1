//! Credit engine
//!
//! The single authority for reading, consuming, and mutating a principal's
//! credit record. Rollover is pull-based: every path reloads the record and
//! rolls it into the current calendar month before acting, so a stale record
//! self-heals on its next access instead of needing a scheduler.
//!
//! The engine is constructed with explicit dependencies (store, clock,
//! catalog) and holds no state of its own beyond them.

use std::sync::Arc;

use praline_shared::{PlanTier, PrincipalId};
use time::{Date, Month, OffsetDateTime, Time};

use crate::catalog::{Allowance, PlanCatalog};
use crate::clock::Clock;
use crate::error::{CreditsError, CreditsResult};
use crate::record::{CreditRecord, CreditStatus};
use crate::store::{CreditStore, IncrementOutcome};

/// Bounded retries for the optimistic rollover replace
const ROLLOVER_RETRY_LIMIT: u32 = 3;

/// Outcome of a consumption attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One credit was consumed (or the tier is unmetered); the privileged
    /// operation may proceed
    Consumed { remaining: Allowance },
    /// The period's allowance is spent; the operation must not proceed
    Exhausted,
}

impl ConsumeOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed { .. })
    }
}

#[derive(Clone)]
pub struct CreditEngine {
    store: Arc<dyn CreditStore>,
    clock: Arc<dyn Clock>,
    catalog: PlanCatalog,
}

impl CreditEngine {
    pub fn new(store: Arc<dyn CreditStore>, clock: Arc<dyn Clock>, catalog: PlanCatalog) -> Self {
        Self {
            store,
            clock,
            catalog,
        }
    }

    /// Current credit status for a principal
    ///
    /// Creates the default free-tier record on first access and persists a
    /// rollover if the period has elapsed.
    pub async fn remaining(&self, principal: PrincipalId) -> CreditsResult<CreditStatus> {
        let record = self.load_current(principal).await?;
        Ok(CreditStatus::from(&record))
    }

    /// Attempt to consume one credit
    ///
    /// Denial never mutates the record. The increment is delegated to the
    /// store as a guarded single-row update, so two concurrent attempts for
    /// the last credit resolve to exactly one grant even across processes.
    pub async fn try_consume(&self, principal: PrincipalId) -> CreditsResult<ConsumeOutcome> {
        let record = self.load_current(principal).await?;

        if record.tier.is_unlimited() {
            // Unmetered tiers skip the counter entirely so it cannot grow
            // without bound
            return Ok(ConsumeOutcome::Consumed {
                remaining: Allowance::Unlimited,
            });
        }

        match self
            .store
            .increment_consumed(principal, record.allowance)
            .await?
        {
            IncrementOutcome::Incremented { consumed } => Ok(ConsumeOutcome::Consumed {
                remaining: Allowance::Metered((record.allowance - consumed).max(0)),
            }),
            IncrementOutcome::Denied => Ok(ConsumeOutcome::Exhausted),
            IncrementOutcome::Missing => Err(CreditsError::Contention(format!(
                "credit record for {} disappeared mid-consume",
                principal
            ))),
        }
    }

    /// Apply a tier change
    ///
    /// Snaps the allowance to the new tier's catalog value in one update.
    /// Consumed and the period boundary are preserved: an upgrade keeps
    /// spent credits but measures them against the larger allowance, and a
    /// downgrade may leave the counter above the new allowance until the
    /// next rollover. Repeating the same tier is a no-op.
    pub async fn change_tier(
        &self,
        principal: PrincipalId,
        new_tier: PlanTier,
    ) -> CreditsResult<CreditStatus> {
        let previous = self.load_current(principal).await?;
        let allowance = self.catalog.allowance_for(new_tier).stored_value();

        let record = self
            .store
            .update_tier(principal, new_tier, allowance)
            .await?
            .ok_or_else(|| CreditsError::NotFound(format!("credit record for {}", principal)))?;

        if previous.tier != new_tier {
            let direction = if new_tier.rank() > previous.tier.rank() {
                "upgrade"
            } else {
                "downgrade"
            };
            tracing::info!(
                principal_id = %principal,
                from_tier = %previous.tier,
                to_tier = %new_tier,
                direction,
                "plan tier changed"
            );
        }

        Ok(CreditStatus::from(&record))
    }

    /// Load the principal's record, creating it on first access and rolling
    /// an elapsed period into the current one
    async fn load_current(&self, principal: PrincipalId) -> CreditsResult<CreditRecord> {
        for _ in 0..ROLLOVER_RETRY_LIMIT {
            let record = match self.store.load(principal).await? {
                Some(record) => record,
                None => {
                    let fresh = self.fresh_record(principal)?;
                    self.store.create_if_absent(fresh).await?
                }
            };

            let now = self.clock.now();
            if now < record.period_end {
                return Ok(record);
            }

            let rolled = self.rolled_over(record.clone(), now)?;
            if self
                .store
                .replace_if_period_matches(&rolled, record.period_end)
                .await?
            {
                tracing::debug!(
                    principal_id = %principal,
                    tier = %rolled.tier,
                    period_end = %rolled.period_end,
                    "rolled credit record into new period"
                );
                return Ok(rolled);
            }
            // Another instance rolled the record first; reload and re-check
        }

        Err(CreditsError::Contention(format!(
            "rollover for {} kept losing the period-boundary race",
            principal
        )))
    }

    fn fresh_record(&self, principal: PrincipalId) -> CreditsResult<CreditRecord> {
        let now = self.clock.now();
        let tier = PlanTier::default();
        Ok(CreditRecord {
            principal_id: principal,
            tier,
            allowance: self.catalog.allowance_for(tier).stored_value(),
            consumed: 0,
            period_end: next_month_start(now)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reset an elapsed record into the period containing `now`
    ///
    /// Idempotent: once applied, the new period boundary is in the future
    /// and re-application is a no-op on the read path.
    fn rolled_over(
        &self,
        mut record: CreditRecord,
        now: OffsetDateTime,
    ) -> CreditsResult<CreditRecord> {
        record.consumed = 0;
        record.allowance = self.catalog.allowance_for(record.tier).stored_value();
        record.period_end = next_month_start(now)?;
        record.updated_at = now;
        Ok(record)
    }
}

/// First instant (UTC midnight) of the calendar month after `now`
fn next_month_start(now: OffsetDateTime) -> CreditsResult<OffsetDateTime> {
    let date = now.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };
    let first = Date::from_calendar_date(year, month, 1)
        .map_err(|e| CreditsError::Internal(format!("failed to compute period boundary: {}", e)))?;
    Ok(first.with_time(Time::MIDNIGHT).assume_utc())
}
