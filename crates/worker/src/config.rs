//! Worker configuration

use std::env;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Shared secret the payment webhook ingress signs payloads with
    pub plan_webhook_secret: String,
    /// How long completed and given-up sync rows are kept
    pub sync_retention_days: i32,
}

impl WorkerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            plan_webhook_secret: env::var("PLAN_WEBHOOK_SECRET")
                .map_err(|_| ConfigError::Missing("PLAN_WEBHOOK_SECRET"))?,
            sync_retention_days: env::var("PLAN_SYNC_RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}
