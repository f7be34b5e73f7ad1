//! Common types used across Praline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Principal ID wrapper
///
/// A principal is the account whose credit entitlement is tracked: one per
/// workshop, the tenant unit of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PrincipalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Subscription plan tier
///
/// Tiers are totally ordered by capability: Free < Standard < Unlimited.
/// Assistant usage on the Unlimited tier is never metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Standard,
    Unlimited,
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::Free
    }
}

impl PlanTier {
    /// Capability rank for this tier (higher = more capable)
    /// Free: 0, Standard: 1, Unlimited: 2
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Standard => 1,
            Self::Unlimited => 2,
        }
    }

    /// Whether assistant usage on this tier skips metering entirely
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Standard => write!(f, "standard"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "unlimited" => Ok(Self::Unlimited),
            _ => Err(format!("Invalid plan tier: {}", s)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tier_default() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
    }

    #[test]
    fn test_plan_tier_ranks_are_ordered() {
        assert!(PlanTier::Free.rank() < PlanTier::Standard.rank());
        assert!(PlanTier::Standard.rank() < PlanTier::Unlimited.rank());
    }

    #[test]
    fn test_plan_tier_unlimited_flag() {
        assert!(!PlanTier::Free.is_unlimited());
        assert!(!PlanTier::Standard.is_unlimited());
        assert!(PlanTier::Unlimited.is_unlimited());
    }

    #[test]
    fn test_plan_tier_display() {
        assert_eq!(format!("{}", PlanTier::Free), "free");
        assert_eq!(format!("{}", PlanTier::Standard), "standard");
        assert_eq!(format!("{}", PlanTier::Unlimited), "unlimited");
    }

    #[test]
    fn test_plan_tier_from_str() {
        assert_eq!("free".parse::<PlanTier>().unwrap(), PlanTier::Free);
        assert_eq!("STANDARD".parse::<PlanTier>().unwrap(), PlanTier::Standard);
        assert_eq!(
            "Unlimited".parse::<PlanTier>().unwrap(),
            PlanTier::Unlimited
        );
        assert!("gold".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_plan_tier_serde_round_trip() {
        let json = serde_json::to_string(&PlanTier::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let tier: PlanTier = serde_json::from_str(&json).unwrap();
        assert_eq!(tier, PlanTier::Standard);
    }

    #[test]
    fn test_principal_id_new_is_unique() {
        let id1 = PrincipalId::new();
        let id2 = PrincipalId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_principal_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let principal: PrincipalId = uuid.into();
        assert_eq!(principal.0, uuid);
        assert_eq!(principal.to_string(), uuid.to_string());
    }
}
