//! Plan catalog
//!
//! Static lookup from a subscription tier to its monthly assistant-credit
//! allowance. The metered defaults can be tuned per deployment via
//! environment variables; the Unlimited tier is never metered.

use std::sync::OnceLock;

use praline_shared::PlanTier;

/// Default monthly assistant credits per tier
/// Free (10) → Standard (100) → Unlimited
const FREE_MONTHLY_CREDITS: i64 = 10;
const STANDARD_MONTHLY_CREDITS: i64 = 100;

/// Get the configurable Free tier allowance
/// Configurable via CREDITS_FREE_MONTHLY (default: 10)
fn free_monthly_credits() -> i64 {
    static LIMIT: OnceLock<i64> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var("CREDITS_FREE_MONTHLY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FREE_MONTHLY_CREDITS)
    })
}

/// Get the configurable Standard tier allowance
/// Configurable via CREDITS_STANDARD_MONTHLY (default: 100)
fn standard_monthly_credits() -> i64 {
    static LIMIT: OnceLock<i64> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var("CREDITS_STANDARD_MONTHLY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(STANDARD_MONTHLY_CREDITS)
    })
}

/// Monthly allowance for a tier: a metered credit budget, or unmetered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    /// Fixed number of assistant credits per calendar month
    Metered(i64),
    /// Never metered, never decremented
    Unlimited,
}

impl Allowance {
    /// Value stored in the allowance column
    ///
    /// Unmetered tiers store a sentinel the consume path never reads; it
    /// short-circuits on the tier before consulting the column.
    pub fn stored_value(&self) -> i64 {
        match self {
            Self::Metered(n) => *n,
            Self::Unlimited => i64::MAX,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl std::fmt::Display for Allowance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metered(n) => write!(f, "{}", n),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

// Serialized as a bare integer or the string "unlimited", the shape the
// status endpoints expose to clients.
impl serde::Serialize for Allowance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Metered(n) => serializer.serialize_i64(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Static tier → allowance lookup
///
/// Pure and total: every tier in the closed set has an allowance, so there
/// is no failure mode to propagate to callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanCatalog;

impl PlanCatalog {
    pub fn allowance_for(&self, tier: PlanTier) -> Allowance {
        match tier {
            PlanTier::Free => Allowance::Metered(free_monthly_credits()),
            PlanTier::Standard => Allowance::Metered(standard_monthly_credits()),
            PlanTier::Unlimited => Allowance::Unlimited,
        }
    }
}
