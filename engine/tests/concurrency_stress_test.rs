//! Concurrency stress tests for last-slot scenarios.
//!
//! These verify that under heavy concurrent load the engine never
//! over-allocates, never loses a unit, and promotes at most one waiting
//! entry per released slot.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use futures::future::join_all;
use seatline_core::environment::SystemClock;
use seatline_engine::{
    AllocationEngine, AllocationStatus, EventId, Money, RequesterId,
    identity::InMemoryRequesterDirectory,
    notify::DiscardNotificationSink,
    payment_gateway::MockPaymentGateway,
    render::InlinePassRenderer,
    types::ContactAddress,
};
use std::sync::Arc;

fn engine_with(directory: Arc<InMemoryRequesterDirectory>) -> AllocationEngine {
    AllocationEngine::new(
        directory,
        MockPaymentGateway::shared(),
        DiscardNotificationSink::shared(),
        InlinePassRenderer::shared(),
        Arc::new(SystemClock),
    )
}

async fn register_buyers(
    directory: &InMemoryRequesterDirectory,
    count: usize,
) -> Vec<RequesterId> {
    let mut buyers = Vec::with_capacity(count);
    for index in 0..count {
        buyers.push(
            directory
                .register(ContactAddress::new(format!("buyer{index}@example.com")))
                .await,
        );
    }
    buyers
}

async fn assert_capacity_invariant(engine: &AllocationEngine, event_id: EventId) {
    let available = engine.available_slots(event_id).await.expect("event open");
    let total = engine.total_slots(event_id).await.expect("event open");
    let confirmed = engine.confirmed_count(event_id).await;
    assert_eq!(
        available as usize + confirmed,
        total as usize,
        "available + confirmed != total"
    );
}

/// 100 concurrent admissions against 5 slots: exactly 5 confirm, 95 wait,
/// and the waitlist positions are a dense 1..=95 permutation.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn oversubscribed_event_confirms_exactly_capacity() {
    const CAPACITY: u32 = 5;
    const BUYERS: usize = 100;

    let directory = InMemoryRequesterDirectory::shared();
    let engine = engine_with(directory.clone());
    let event_id = EventId::new();
    engine.open_event(event_id, CAPACITY).await.unwrap();

    let buyers = register_buyers(&directory, BUYERS).await;

    let handles: Vec<_> = buyers
        .iter()
        .map(|&buyer| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .join_or_book(event_id, buyer, Money::from_cents(2_500))
                    .await
            })
        })
        .collect();

    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("join failed"))
        .collect();

    let confirmed: Vec<_> = outcomes
        .iter()
        .filter(|outcome| outcome.record.status == AllocationStatus::Confirmed)
        .collect();
    let waiting: Vec<_> = outcomes
        .iter()
        .filter(|outcome| outcome.record.status == AllocationStatus::Waiting)
        .collect();

    assert_eq!(confirmed.len(), CAPACITY as usize, "over-allocation");
    assert_eq!(waiting.len(), BUYERS - CAPACITY as usize);
    assert_eq!(engine.available_slots(event_id).await, Some(0));
    assert_eq!(engine.waiting_count(event_id).await, BUYERS - CAPACITY as usize);
    assert_capacity_invariant(&engine, event_id).await;

    // Positions form a dense 1..=N permutation
    let mut positions: Vec<u32> = Vec::new();
    for outcome in &waiting {
        positions.push(
            engine
                .queue_position(event_id, outcome.record.requester_id)
                .await,
        );
    }
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=positions.len() as u32).collect();
    assert_eq!(positions, expected);
}

/// N concurrent cancellations promote at most N waiting entries: every
/// freed unit is either handed to exactly one waiting buyer or left
/// available, never both and never twice.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_cancellations_promote_one_winner_per_slot() {
    const CAPACITY: u32 = 10;
    const WAITING: usize = 20;

    let directory = InMemoryRequesterDirectory::shared();
    let engine = engine_with(directory.clone());
    let event_id = EventId::new();
    engine.open_event(event_id, CAPACITY).await.unwrap();

    let holders = register_buyers(&directory, CAPACITY as usize).await;
    let waiters = register_buyers(&directory, WAITING).await;

    let mut held_allocations = Vec::new();
    for &holder in &holders {
        let outcome = engine
            .join_or_book(event_id, holder, Money::from_cents(2_500))
            .await
            .unwrap();
        assert_eq!(outcome.record.status, AllocationStatus::Confirmed);
        held_allocations.push((outcome.record.id, holder));
    }
    for &waiter in &waiters {
        let outcome = engine
            .join_or_book(event_id, waiter, Money::from_cents(2_500))
            .await
            .unwrap();
        assert_eq!(outcome.record.status, AllocationStatus::Waiting);
    }

    // Every confirmed holder cancels at once
    let handles: Vec<_> = held_allocations
        .into_iter()
        .map(|(allocation_id, holder)| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.cancel(allocation_id, holder).await })
        })
        .collect();
    let receipts: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("cancel failed"))
        .collect();

    assert!(receipts.iter().all(|receipt| receipt.released_slot));

    // Each of the 10 freed units promoted exactly one waiting buyer
    assert_eq!(engine.confirmed_count(event_id).await, CAPACITY as usize);
    assert_eq!(engine.available_slots(event_id).await, Some(0));
    assert_eq!(
        engine.waiting_count(event_id).await,
        WAITING - CAPACITY as usize
    );
    assert_capacity_invariant(&engine, event_id).await;

    // Remaining positions are dense after the churn
    let mut positions: Vec<u32> = Vec::new();
    for &waiter in &waiters {
        let position = engine.queue_position(event_id, waiter).await;
        if position > 0 {
            positions.push(position);
        }
    }
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=positions.len() as u32).collect();
    assert_eq!(positions, expected);
}

/// A storm of interleaved joins and immediate cancels across two events
/// settles to a consistent quiescent state.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_join_cancel_storm_settles_consistently() {
    const BUYERS: usize = 60;

    let directory = InMemoryRequesterDirectory::shared();
    let engine = engine_with(directory.clone());
    let event_a = EventId::new();
    let event_b = EventId::new();
    engine.open_event(event_a, 3).await.unwrap();
    engine.open_event(event_b, 0).await.unwrap();

    let buyers = register_buyers(&directory, BUYERS).await;

    let handles: Vec<_> = buyers
        .iter()
        .enumerate()
        .map(|(index, &buyer)| {
            let engine = engine.clone();
            let event_id = if index % 2 == 0 { event_a } else { event_b };
            tokio::spawn(async move {
                let outcome = engine
                    .join_or_book(event_id, buyer, Money::from_cents(1_000))
                    .await
                    .expect("join failed");
                // Every third buyer cancels right away
                if index % 3 == 0 {
                    engine
                        .cancel(outcome.record.id, buyer)
                        .await
                        .expect("cancel failed");
                }
            })
        })
        .collect();
    for joined in join_all(handles).await {
        joined.expect("task panicked");
    }

    for event_id in [event_a, event_b] {
        assert_capacity_invariant(&engine, event_id).await;

        // Waiting positions are a dense 1..=N permutation
        let mut positions: Vec<u32> = Vec::new();
        for &buyer in &buyers {
            let position = engine.queue_position(event_id, buyer).await;
            if position > 0 {
                positions.push(position);
            }
        }
        positions.sort_unstable();
        let expected: Vec<u32> = (1..=positions.len() as u32).collect();
        assert_eq!(positions, expected);
    }
}
