//! Credit audit events
//!
//! Append-only log of entitlement changes. Answers "why is this principal on
//! this tier?" and keeps a trace of plan syncs that were given up on.

use praline_shared::{PlanTier, PrincipalId};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CreditsResult;

/// Types of credit events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditEventType {
    TierChanged,
    PlanSyncFailed,
}

impl std::fmt::Display for CreditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CreditEventType::TierChanged => "TIER_CHANGED",
            CreditEventType::PlanSyncFailed => "PLAN_SYNC_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Who triggered the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// End user through the UI
    User,
    /// System automation
    System,
    /// Payment-provider webhook
    PaymentProvider,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorType::User => write!(f, "user"),
            ActorType::System => write!(f, "system"),
            ActorType::PaymentProvider => write!(f, "payment_provider"),
        }
    }
}

/// A credit event row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreditEvent {
    pub id: Uuid,
    pub principal_id: PrincipalId,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub provider_event_id: Option<String>,
    pub actor_type: String,
    pub created_at: OffsetDateTime,
}

/// Service for logging and querying credit events
#[derive(Clone)]
pub struct CreditEventLogger {
    pool: PgPool,
}

impl CreditEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn log(
        &self,
        principal: PrincipalId,
        event_type: CreditEventType,
        event_data: serde_json::Value,
        provider_event_id: Option<&str>,
        actor_type: ActorType,
    ) -> CreditsResult<Uuid> {
        let id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO credit_events (
                principal_id, event_type, event_data, provider_event_id, actor_type
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(principal)
        .bind(event_type.to_string())
        .bind(&event_data)
        .bind(provider_event_id)
        .bind(actor_type.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.0)
    }

    /// Log a tier change
    pub async fn log_tier_change(
        &self,
        principal: PrincipalId,
        from_tier: PlanTier,
        to_tier: PlanTier,
        provider_event_id: Option<&str>,
        actor_type: ActorType,
    ) -> CreditsResult<Uuid> {
        self.log(
            principal,
            CreditEventType::TierChanged,
            serde_json::json!({
                "from_tier": from_tier.to_string(),
                "to_tier": to_tier.to_string(),
            }),
            provider_event_id,
            actor_type,
        )
        .await
    }

    /// Log a plan sync that exhausted its retries
    pub async fn log_sync_failure(
        &self,
        principal: PrincipalId,
        provider_event_id: Option<&str>,
        error: &str,
    ) -> CreditsResult<Uuid> {
        self.log(
            principal,
            CreditEventType::PlanSyncFailed,
            serde_json::json!({ "error": error }),
            provider_event_id,
            ActorType::System,
        )
        .await
    }

    /// Recent events for a principal, newest first
    pub async fn events_for_principal(
        &self,
        principal: PrincipalId,
        limit: i64,
    ) -> CreditsResult<Vec<CreditEvent>> {
        let events: Vec<CreditEvent> = sqlx::query_as(
            r#"
            SELECT id, principal_id, event_type, event_data, provider_event_id,
                   actor_type, created_at
            FROM credit_events
            WHERE principal_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(principal)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
