//! Praline background worker
//!
//! Owns the asynchronous side of the credit engine: draining the plan sync
//! queue written by the payment webhook ingress and pruning old queue rows.

use std::sync::Arc;

use anyhow::Context;
use praline_credits::{CreditEngine, CreditEventLogger, PgCreditStore, PlanCatalog, SystemClock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

mod config;
mod plan_sync;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::from_env().context("failed to load worker configuration")?;

    let pool = praline_shared::db::create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    praline_shared::db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let engine = CreditEngine::new(
        Arc::new(PgCreditStore::new(pool.clone())),
        Arc::new(SystemClock),
        PlanCatalog,
    );
    let events = CreditEventLogger::new(pool.clone());

    let scheduler = JobScheduler::new().await?;

    // Drain the plan sync queue twice a minute
    {
        let pool = pool.clone();
        let engine = engine.clone();
        let events = events.clone();
        let secret = config.plan_webhook_secret.clone();
        scheduler
            .add(Job::new_async("*/30 * * * * *", move |_id, _sched| {
                let pool = pool.clone();
                let engine = engine.clone();
                let events = events.clone();
                let secret = secret.clone();
                Box::pin(async move {
                    plan_sync::process_plan_sync_queue(&pool, &engine, &events, &secret).await;
                })
            })?)
            .await?;
    }

    // Prune old queue rows nightly
    {
        let pool = pool.clone();
        let retention_days = config.sync_retention_days;
        scheduler
            .add(Job::new_async("0 15 3 * * *", move |_id, _sched| {
                let pool = pool.clone();
                Box::pin(async move {
                    plan_sync::cleanup_old_syncs(&pool, retention_days).await;
                })
            })?)
            .await?;
    }

    scheduler.start().await?;
    info!("Plan sync worker started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down plan sync worker");

    Ok(())
}
