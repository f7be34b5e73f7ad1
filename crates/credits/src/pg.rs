//! Postgres-backed credit store

use async_trait::async_trait;
use praline_shared::{PlanTier, PrincipalId};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{CreditsError, CreditsResult};
use crate::record::CreditRecord;
use crate::store::{CreditStore, IncrementOutcome};

/// Credit store backed by the credit_records table
///
/// Every mutation is a single conditional UPDATE, so two instances serving
/// the same principal cannot lose an update between a read and a write.
#[derive(Clone)]
pub struct PgCreditStore {
    pool: PgPool,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditStore for PgCreditStore {
    async fn load(&self, principal: PrincipalId) -> CreditsResult<Option<CreditRecord>> {
        let record: Option<CreditRecord> = sqlx::query_as(
            r#"
            SELECT principal_id, tier, allowance, consumed, period_end, created_at, updated_at
            FROM credit_records
            WHERE principal_id = $1
            "#,
        )
        .bind(principal)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn create_if_absent(&self, record: CreditRecord) -> CreditsResult<CreditRecord> {
        let inserted: Option<CreditRecord> = sqlx::query_as(
            r#"
            INSERT INTO credit_records (
                principal_id, tier, allowance, consumed, period_end, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (principal_id) DO NOTHING
            RETURNING principal_id, tier, allowance, consumed, period_end, created_at, updated_at
            "#,
        )
        .bind(record.principal_id)
        .bind(record.tier)
        .bind(record.allowance)
        .bind(record.consumed)
        .bind(record.period_end)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(stored) => Ok(stored),
            // Lost the insert race; the winner's record is authoritative
            None => self.load(record.principal_id).await?.ok_or_else(|| {
                CreditsError::Internal(format!(
                    "credit record for {} vanished after insert conflict",
                    record.principal_id
                ))
            }),
        }
    }

    async fn replace_if_period_matches(
        &self,
        record: &CreditRecord,
        expected_period_end: OffsetDateTime,
    ) -> CreditsResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE credit_records
            SET tier = $2, allowance = $3, consumed = $4, period_end = $5, updated_at = NOW()
            WHERE principal_id = $1 AND period_end = $6
            "#,
        )
        .bind(record.principal_id)
        .bind(record.tier)
        .bind(record.allowance)
        .bind(record.consumed)
        .bind(record.period_end)
        .bind(expected_period_end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_tier(
        &self,
        principal: PrincipalId,
        tier: PlanTier,
        allowance: i64,
    ) -> CreditsResult<Option<CreditRecord>> {
        let record: Option<CreditRecord> = sqlx::query_as(
            r#"
            UPDATE credit_records
            SET tier = $2, allowance = $3, updated_at = NOW()
            WHERE principal_id = $1
            RETURNING principal_id, tier, allowance, consumed, period_end, created_at, updated_at
            "#,
        )
        .bind(principal)
        .bind(tier)
        .bind(allowance)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn increment_consumed(
        &self,
        principal: PrincipalId,
        guard_max: i64,
    ) -> CreditsResult<IncrementOutcome> {
        let incremented: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE credit_records
            SET consumed = consumed + 1, updated_at = NOW()
            WHERE principal_id = $1 AND consumed < $2
            RETURNING consumed
            "#,
        )
        .bind(principal)
        .bind(guard_max)
        .fetch_optional(&self.pool)
        .await?;

        match incremented {
            Some((consumed,)) => Ok(IncrementOutcome::Incremented { consumed }),
            None => {
                // Guard failure and missing row look the same to the UPDATE;
                // a follow-up read on the denial path tells them apart
                let exists: (bool,) = sqlx::query_as(
                    "SELECT EXISTS(SELECT 1 FROM credit_records WHERE principal_id = $1)",
                )
                .bind(principal)
                .fetch_one(&self.pool)
                .await?;

                if exists.0 {
                    Ok(IncrementOutcome::Denied)
                } else {
                    Ok(IncrementOutcome::Missing)
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use time::macros::datetime;

    async fn test_store() -> PgCreditStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = praline_shared::db::create_pool(&url)
            .await
            .expect("Failed to create pool");
        PgCreditStore::new(pool)
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_round_trip_and_guard() {
        let store = test_store().await;
        let principal = PrincipalId::new();
        let now = datetime!(2026-02-10 12:00 UTC);

        let record = CreditRecord {
            principal_id: principal,
            tier: PlanTier::Free,
            allowance: 2,
            consumed: 0,
            period_end: datetime!(2026-03-01 0:00 UTC),
            created_at: now,
            updated_at: now,
        };

        store.create_if_absent(record).await.unwrap();

        assert_eq!(
            store.increment_consumed(principal, 2).await.unwrap(),
            IncrementOutcome::Incremented { consumed: 1 }
        );
        assert_eq!(
            store.increment_consumed(principal, 2).await.unwrap(),
            IncrementOutcome::Incremented { consumed: 2 }
        );
        assert_eq!(
            store.increment_consumed(principal, 2).await.unwrap(),
            IncrementOutcome::Denied
        );

        let stored = store.load(principal).await.unwrap().unwrap();
        assert_eq!(stored.consumed, 2);

        // Cleanup
        sqlx::query("DELETE FROM credit_records WHERE principal_id = $1")
            .bind(principal)
            .execute(&store.pool)
            .await
            .ok();
    }
}
