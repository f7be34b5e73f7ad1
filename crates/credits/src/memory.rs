//! In-memory credit store (for development and tests without Postgres)
//!
//! Every mutation takes the write lock, which gives the same
//! record-granularity atomicity the Postgres store gets from
//! single-statement conditional updates.

use std::collections::HashMap;

use async_trait::async_trait;
use praline_shared::{PlanTier, PrincipalId};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::CreditsResult;
use crate::record::CreditRecord;
use crate::store::{CreditStore, IncrementOutcome};

pub struct InMemoryCreditStore {
    records: RwLock<HashMap<PrincipalId, CreditRecord>>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCreditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn load(&self, principal: PrincipalId) -> CreditsResult<Option<CreditRecord>> {
        Ok(self.records.read().await.get(&principal).cloned())
    }

    async fn create_if_absent(&self, record: CreditRecord) -> CreditsResult<CreditRecord> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(record.principal_id)
            .or_insert(record)
            .clone())
    }

    async fn replace_if_period_matches(
        &self,
        record: &CreditRecord,
        expected_period_end: OffsetDateTime,
    ) -> CreditsResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.principal_id) {
            Some(stored) if stored.period_end == expected_period_end => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_tier(
        &self,
        principal: PrincipalId,
        tier: PlanTier,
        allowance: i64,
    ) -> CreditsResult<Option<CreditRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&principal).map(|stored| {
            stored.tier = tier;
            stored.allowance = allowance;
            stored.updated_at = OffsetDateTime::now_utc();
            stored.clone()
        }))
    }

    async fn increment_consumed(
        &self,
        principal: PrincipalId,
        guard_max: i64,
    ) -> CreditsResult<IncrementOutcome> {
        let mut records = self.records.write().await;
        match records.get_mut(&principal) {
            None => Ok(IncrementOutcome::Missing),
            Some(stored) if stored.consumed < guard_max => {
                stored.consumed += 1;
                stored.updated_at = OffsetDateTime::now_utc();
                Ok(IncrementOutcome::Incremented {
                    consumed: stored.consumed,
                })
            }
            Some(_) => Ok(IncrementOutcome::Denied),
        }
    }
}
