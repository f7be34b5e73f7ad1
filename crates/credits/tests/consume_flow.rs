//! End-to-end credit flow tests
//!
//! Exercise the engine against the in-memory store and a manual clock:
//! consume to exhaustion, roll the period over, change tiers mid-period, and
//! race two consumers for the last credit.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use praline_credits::{
    Allowance, ConsumeOutcome, CreditEngine, CreditGate, InMemoryCreditStore, ManualClock,
    PlanCatalog,
};
use praline_shared::{PlanTier, PrincipalId};
use time::macros::datetime;
use time::Duration;

const START: time::OffsetDateTime = datetime!(2026-03-10 9:30 UTC);

fn engine_with_clock() -> (CreditEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let engine = CreditEngine::new(
        Arc::new(InMemoryCreditStore::new()),
        clock.clone(),
        PlanCatalog,
    );
    (engine, clock)
}

/// Value-sensitive tests assume the catalog defaults (free=10, standard=100)
fn overrides_active() -> bool {
    std::env::var("CREDITS_FREE_MONTHLY").is_ok()
        || std::env::var("CREDITS_STANDARD_MONTHLY").is_ok()
}

async fn consume_n(engine: &CreditEngine, principal: PrincipalId, n: i64) {
    for i in 0..n {
        let outcome = engine.try_consume(principal).await.unwrap();
        assert!(outcome.is_consumed(), "consume {} of {} should succeed", i + 1, n);
    }
}

#[tokio::test]
async fn test_fresh_principal_starts_on_free_with_full_allowance() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    let status = engine.remaining(principal).await.unwrap();
    assert_eq!(status.tier, PlanTier::Free);
    assert_eq!(status.remaining, Allowance::Metered(10));
    // Period is aligned to the first instant of the next calendar month
    assert_eq!(status.period_end, datetime!(2026-04-01 0:00 UTC));
}

#[tokio::test]
async fn test_consumption_is_monotonic_until_exhausted() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    for n in 1..=10_i64 {
        let outcome = engine.try_consume(principal).await.unwrap();
        assert_eq!(
            outcome,
            ConsumeOutcome::Consumed {
                remaining: Allowance::Metered(10 - n)
            }
        );
        let status = engine.remaining(principal).await.unwrap();
        assert_eq!(status.remaining, Allowance::Metered(10 - n));
    }

    // The 11th attempt is denied
    let outcome = engine.try_consume(principal).await.unwrap();
    assert_eq!(outcome, ConsumeOutcome::Exhausted);
}

#[tokio::test]
async fn test_denial_does_not_mutate_the_record() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 10).await;

    let before = engine.remaining(principal).await.unwrap();
    for _ in 0..5 {
        let outcome = engine.try_consume(principal).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Exhausted);
    }
    let after = engine.remaining(principal).await.unwrap();
    assert_eq!(after.remaining, before.remaining);
}

#[tokio::test]
async fn test_unlimited_tier_never_decrements() {
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    engine
        .change_tier(principal, PlanTier::Unlimited)
        .await
        .unwrap();

    for _ in 0..500 {
        let outcome = engine.try_consume(principal).await.unwrap();
        assert_eq!(
            outcome,
            ConsumeOutcome::Consumed {
                remaining: Allowance::Unlimited
            }
        );
    }

    let status = engine.remaining(principal).await.unwrap();
    assert_eq!(status.remaining, Allowance::Unlimited);
}

#[tokio::test]
async fn test_rollover_restores_the_allowance() {
    if overrides_active() {
        return;
    }
    let (engine, clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 10).await;
    assert_eq!(
        engine.try_consume(principal).await.unwrap(),
        ConsumeOutcome::Exhausted
    );

    // Cross the period boundary; the next read heals the record
    clock.set(datetime!(2026-04-02 12:00 UTC));

    let status = engine.remaining(principal).await.unwrap();
    assert_eq!(status.remaining, Allowance::Metered(10));
    assert_eq!(status.period_end, datetime!(2026-05-01 0:00 UTC));

    // And consumption starts over from a zeroed counter
    let outcome = engine.try_consume(principal).await.unwrap();
    assert_eq!(
        outcome,
        ConsumeOutcome::Consumed {
            remaining: Allowance::Metered(9)
        }
    );
}

#[tokio::test]
async fn test_rollover_is_idempotent() {
    if overrides_active() {
        return;
    }
    let (engine, clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 4).await;
    clock.advance(Duration::days(40));

    let first = engine.remaining(principal).await.unwrap();
    let second = engine.remaining(principal).await.unwrap();
    assert_eq!(first.remaining, second.remaining);
    assert_eq!(first.period_end, second.period_end);
}

#[tokio::test]
async fn test_upgrade_keeps_consumed_and_period() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 7).await;
    let before = engine.remaining(principal).await.unwrap();

    let status = engine
        .change_tier(principal, PlanTier::Standard)
        .await
        .unwrap();

    // consumed=7 measured against the new allowance of 100
    assert_eq!(status.tier, PlanTier::Standard);
    assert_eq!(status.remaining, Allowance::Metered(93));
    assert_eq!(status.period_end, before.period_end);
}

#[tokio::test]
async fn test_downgrade_clamps_remaining_at_zero() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    engine
        .change_tier(principal, PlanTier::Standard)
        .await
        .unwrap();
    consume_n(&engine, principal, 80).await;

    let status = engine.change_tier(principal, PlanTier::Free).await.unwrap();
    assert_eq!(status.remaining, Allowance::Metered(0));

    // And consumption stays denied, not negative
    assert_eq!(
        engine.try_consume(principal).await.unwrap(),
        ConsumeOutcome::Exhausted
    );
}

#[tokio::test]
async fn test_downgrade_heals_on_rollover() {
    if overrides_active() {
        return;
    }
    let (engine, clock) = engine_with_clock();
    let principal = PrincipalId::new();

    engine
        .change_tier(principal, PlanTier::Standard)
        .await
        .unwrap();
    consume_n(&engine, principal, 80).await;
    engine.change_tier(principal, PlanTier::Free).await.unwrap();

    clock.set(datetime!(2026-04-01 0:00 UTC));

    let status = engine.remaining(principal).await.unwrap();
    assert_eq!(status.tier, PlanTier::Free);
    assert_eq!(status.remaining, Allowance::Metered(10));
}

#[tokio::test]
async fn test_change_tier_is_idempotent() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 3).await;

    let first = engine
        .change_tier(principal, PlanTier::Standard)
        .await
        .unwrap();
    let second = engine
        .change_tier(principal, PlanTier::Standard)
        .await
        .unwrap();

    assert_eq!(first.tier, second.tier);
    assert_eq!(first.remaining, second.remaining);
    assert_eq!(first.period_end, second.period_end);
}

#[tokio::test]
async fn test_two_racers_for_the_last_credit_get_one_grant() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let principal = PrincipalId::new();

    consume_n(&engine, principal, 9).await;

    let left = engine.clone();
    let right = engine.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { left.try_consume(principal).await }),
        tokio::spawn(async move { right.try_consume(principal).await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    let grants = [a, b].iter().filter(|o| o.is_consumed()).count();
    assert_eq!(grants, 1, "exactly one racer may take the last credit");

    let status = engine.remaining(principal).await.unwrap();
    assert_eq!(status.remaining, Allowance::Metered(0));
}

#[tokio::test]
async fn test_gate_admits_until_exhausted() {
    if overrides_active() {
        return;
    }
    let (engine, _clock) = engine_with_clock();
    let gate = CreditGate::new(engine);
    let principal = PrincipalId::new();

    for _ in 0..10 {
        gate.admit(principal).await.unwrap();
    }

    let denial = gate.admit(principal).await.unwrap_err();
    assert!(denial.is_exhausted());
}
