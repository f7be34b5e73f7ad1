//! Payment-provider plan-change events
//!
//! The payment provider confirms checkout and subscription changes by
//! webhook. The HTTP ingress only enqueues the raw body and its signature
//! header; authenticity is verified here, next to the state change it
//! authorizes, so an unauthenticated row can never move a principal between
//! tiers.

use hmac::{Hmac, Mac};
use praline_shared::{PlanTier, PrincipalId};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{CreditsError, CreditsResult};

type HmacSha256 = Hmac<Sha256>;

/// Event types that drive a tier change
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.completed";
pub const EVENT_SUBSCRIPTION_UPDATED: &str = "subscription.updated";
pub const EVENT_SUBSCRIPTION_DELETED: &str = "subscription.deleted";

/// A plan-change event as enqueued by the webhook ingress
#[derive(Debug, Clone, Deserialize)]
pub struct PlanChangeEvent {
    /// Provider-side event ID, kept for audit and idempotency tracing
    pub event_id: String,
    pub event_type: String,
    pub principal_id: PrincipalId,
    /// Target tier name; absent on deletion events
    #[serde(default)]
    pub tier: Option<String>,
}

impl PlanChangeEvent {
    /// Parse an event from the raw body the provider sent
    pub fn from_json(raw: &str) -> CreditsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| CreditsError::Internal(format!("malformed plan change payload: {}", e)))
    }

    /// Resolve the tier this event puts the principal on
    ///
    /// A deleted subscription always lands on Free; other events carry the
    /// tier name and are rejected without mutation when it is unknown.
    pub fn target_tier(&self) -> CreditsResult<PlanTier> {
        if self.event_type == EVENT_SUBSCRIPTION_DELETED {
            return Ok(PlanTier::Free);
        }
        match &self.tier {
            Some(name) => name
                .parse()
                .map_err(|_| CreditsError::InvalidTier(name.clone())),
            None => Err(CreditsError::InvalidTier(format!(
                "missing tier on {} event {}",
                self.event_type, self.event_id
            ))),
        }
    }
}

/// Verify the HMAC-SHA256 signature the ingress recorded for a payload
pub fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}
