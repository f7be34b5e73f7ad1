//! Plan sync queue processor
//!
//! Payment-provider webhooks land in the plan_sync_queue table; this module
//! drains it. Each row is claimed atomically, its signature verified, the
//! target tier resolved, and the tier change applied through the credit
//! engine. Rows that keep failing are given up on once their attempts are
//! spent and leave a trace in the audit log.

use praline_credits::webhook::{self, PlanChangeEvent};
use praline_credits::{CreditEngine, CreditEventLogger, CreditsError};
use sqlx::PgPool;
use std::future::Future;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Claim and process a batch of pending plan sync rows
pub async fn process_plan_sync_queue(
    pool: &PgPool,
    engine: &CreditEngine,
    events: &CreditEventLogger,
    webhook_secret: &str,
) {
    // Claim in one statement so a second worker instance cannot pick up the
    // same rows
    let rows: Vec<(Uuid, String, String, i32, i32)> = match sqlx::query_as(
        r#"
        UPDATE plan_sync_queue
        SET status = 'processing', attempts = attempts + 1, last_attempt_at = NOW()
        WHERE id IN (
            SELECT id FROM plan_sync_queue
            WHERE (status = 'pending'
                   OR (status IN ('processing', 'failed') AND attempts < max_attempts))
              AND (last_attempt_at IS NULL OR last_attempt_at < NOW() - INTERVAL '5 minutes')
            ORDER BY created_at ASC
            LIMIT 10
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, payload, signature, attempts, max_attempts
        "#,
    )
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to claim plan sync rows");
            return;
        }
    };

    if rows.is_empty() {
        return; // No work to do
    }

    info!(count = rows.len(), "Processing plan sync queue");

    for (queue_id, payload, signature, attempts, max_attempts) in rows {
        match apply_plan_change(engine, events, webhook_secret, &payload, &signature).await {
            Ok(()) => {
                if let Err(e) = sqlx::query(
                    "UPDATE plan_sync_queue SET status = 'completed', processed_at = NOW() WHERE id = $1",
                )
                .bind(queue_id)
                .execute(pool)
                .await
                {
                    error!(queue_id = %queue_id, error = %e, "Failed to mark sync row completed");
                }
                info!(queue_id = %queue_id, "Plan sync row processed");
            }
            Err(e) => {
                let error_msg = e.to_string();

                if let Err(e) = sqlx::query(
                    "UPDATE plan_sync_queue SET status = 'failed', last_error = $1 WHERE id = $2",
                )
                .bind(&error_msg)
                .bind(queue_id)
                .execute(pool)
                .await
                {
                    error!(queue_id = %queue_id, error = %e, "Failed to mark sync row failed");
                }

                if attempts >= max_attempts {
                    error!(
                        queue_id = %queue_id,
                        attempts,
                        error = %error_msg,
                        "Plan sync permanently failed after max retries"
                    );
                    // Leave a trace in the audit log when the payload at
                    // least named a principal
                    if let Ok(event) = PlanChangeEvent::from_json(&payload) {
                        if let Err(log_err) = events
                            .log_sync_failure(
                                event.principal_id,
                                Some(&event.event_id),
                                &error_msg,
                            )
                            .await
                        {
                            warn!(
                                queue_id = %queue_id,
                                error = %log_err,
                                "Failed to record sync failure event"
                            );
                        }
                    }
                } else {
                    warn!(
                        queue_id = %queue_id,
                        attempts,
                        max_attempts,
                        error = %error_msg,
                        "Plan sync failed, will retry"
                    );
                }
            }
        }
    }
}

/// Verify and apply a single queued plan change
async fn apply_plan_change(
    engine: &CreditEngine,
    events: &CreditEventLogger,
    secret: &str,
    payload: &str,
    signature: &str,
) -> anyhow::Result<()> {
    if !webhook::verify_signature(secret, payload.as_bytes(), signature) {
        anyhow::bail!("payload signature verification failed");
    }

    let event = PlanChangeEvent::from_json(payload)?;
    match event.event_type.as_str() {
        webhook::EVENT_CHECKOUT_COMPLETED
        | webhook::EVENT_SUBSCRIPTION_UPDATED
        | webhook::EVENT_SUBSCRIPTION_DELETED => {}
        other => {
            warn!(event_type = %other, "Ignoring unknown plan event type");
            return Ok(()); // Don't retry unknown types
        }
    }

    let new_tier = event.target_tier()?;
    let previous = with_backoff(|| engine.remaining(event.principal_id)).await?;

    if previous.tier == new_tier {
        info!(
            principal_id = %event.principal_id,
            tier = %new_tier,
            provider_event_id = %event.event_id,
            "Plan already in sync"
        );
        return Ok(());
    }

    with_backoff(|| engine.change_tier(event.principal_id, new_tier)).await?;

    // The tier change itself stands; a lost audit row is not worth failing
    // the whole sync for
    if let Err(e) = events
        .log_tier_change(
            event.principal_id,
            previous.tier,
            new_tier,
            Some(&event.event_id),
            praline_credits::ActorType::PaymentProvider,
        )
        .await
    {
        warn!(
            principal_id = %event.principal_id,
            error = %e,
            "Failed to record tier change event"
        );
    }

    info!(
        principal_id = %event.principal_id,
        from_tier = %previous.tier,
        to_tier = %new_tier,
        provider_event_id = %event.event_id,
        "Applied plan change from payment provider"
    );

    Ok(())
}

/// Retry a transient store failure with jittered exponential backoff;
/// non-transient errors (invalid tier, missing record) surface immediately
async fn with_backoff<T, F, Fut>(op: F) -> Result<T, CreditsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CreditsError>>,
{
    let strategy = ExponentialBackoff::from_millis(50).map(jitter).take(2);
    RetryIf::spawn(strategy, op, |e: &CreditsError| {
        matches!(
            e,
            CreditsError::StoreUnavailable(_) | CreditsError::Contention(_)
        )
    })
    .await
}

/// Delete completed and given-up sync rows past the retention window
pub async fn cleanup_old_syncs(pool: &PgPool, retention_days: i32) {
    let result = sqlx::query(
        r#"
        DELETE FROM plan_sync_queue
        WHERE (status = 'completed'
               AND processed_at < NOW() - make_interval(days => $1))
           OR (status = 'failed' AND attempts >= max_attempts
               AND last_attempt_at < NOW() - make_interval(days => $1))
        "#,
    )
    .bind(retention_days)
    .execute(pool)
    .await;

    match result {
        Ok(rows) => {
            if rows.rows_affected() > 0 {
                info!(
                    deleted = rows.rows_affected(),
                    retention_days, "Cleaned up old plan sync rows"
                );
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to clean up old plan sync rows");
        }
    }
}
