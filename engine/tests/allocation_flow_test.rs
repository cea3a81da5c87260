//! End-to-end tests for the allocation engine.
//!
//! These drive the public engine API the way callers would: identity and
//! payment collaborators in front, notifications observed through a
//! recording sink behind.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use seatline_core::environment::SystemClock;
use seatline_engine::{
    AllocationEngine, AllocationStatus, CaptureOutcome, EngineError, EventId, GateDecision, Money,
    RequesterId,
    identity::InMemoryRequesterDirectory,
    notify::RecordingNotificationSink,
    payment_gateway::MockPaymentGateway,
    render::InlinePassRenderer,
    types::ContactAddress,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: AllocationEngine,
    directory: Arc<InMemoryRequesterDirectory>,
    sink: Arc<RecordingNotificationSink>,
}

fn harness() -> Harness {
    harness_with(MockPaymentGateway::new(), RecordingNotificationSink::new())
}

fn harness_with(gateway: MockPaymentGateway, sink: RecordingNotificationSink) -> Harness {
    let directory = InMemoryRequesterDirectory::shared();
    let sink = Arc::new(sink);
    let engine = AllocationEngine::new(
        directory.clone(),
        Arc::new(gateway),
        sink.clone(),
        InlinePassRenderer::shared(),
        Arc::new(SystemClock),
    );
    Harness {
        engine,
        directory,
        sink,
    }
}

impl Harness {
    async fn buyer(&self, contact: &str) -> RequesterId {
        self.directory.register(ContactAddress::new(contact)).await
    }

    /// Poll until the recording sink has seen a subject containing `needle`.
    async fn wait_for_notification(&self, needle: &str) {
        for _ in 0..200 {
            if self
                .sink
                .sent()
                .iter()
                .any(|notification| notification.subject.contains(needle))
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let subjects: Vec<String> = self
            .sink
            .sent()
            .into_iter()
            .map(|notification| notification.subject)
            .collect();
        panic!("no notification matching {needle:?}; saw {subjects:?}");
    }
}

const PRICE: Money = Money::from_cents(4_500);

#[tokio::test]
async fn capacity_one_cancel_promotes_the_waitlist_head() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();

    let ada = h.buyer("ada@example.com").await;
    let bruno = h.buyer("bruno@example.com").await;

    // Ada takes the only slot
    let ada_join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    assert_eq!(ada_join.record.status, AllocationStatus::Confirmed);
    assert_eq!(ada_join.position, None);
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));

    // Bruno queues at position 1
    let bruno_join = h.engine.join_or_book(event_id, bruno, PRICE).await.unwrap();
    assert_eq!(bruno_join.record.status, AllocationStatus::Waiting);
    assert_eq!(bruno_join.position, Some(1));
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));

    // Ada cancels: the freed unit goes straight to Bruno
    let receipt = h.engine.cancel(ada_join.record.id, ada).await.unwrap();
    assert!(receipt.released_slot);
    assert!(!receipt.already_cancelled);

    let bruno_record = h.engine.allocation(bruno_join.record.id).await.unwrap();
    assert_eq!(bruno_record.status, AllocationStatus::Confirmed);
    assert!(bruno_record.pass_payload.is_some());

    assert_eq!(h.engine.available_slots(event_id).await, Some(0));
    assert_eq!(h.engine.waiting_count(event_id).await, 0);
    assert_eq!(h.engine.queue_position(event_id, bruno).await, 0);
    assert_eq!(h.engine.confirmed_count(event_id).await, 1);
}

#[tokio::test]
async fn sold_out_event_reindexes_after_waitlist_cancel() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 0).await.unwrap();

    let first = h.buyer("first@example.com").await;
    let second = h.buyer("second@example.com").await;

    let join_first = h.engine.join_or_book(event_id, first, PRICE).await.unwrap();
    assert_eq!(join_first.position, Some(1));
    let join_second = h.engine.join_or_book(event_id, second, PRICE).await.unwrap();
    assert_eq!(join_second.position, Some(2));

    // Head leaves; the second joiner moves up
    let receipt = h.engine.leave_waitlist(event_id, first).await.unwrap();
    assert!(!receipt.released_slot);

    assert_eq!(h.engine.queue_position(event_id, second).await, 1);
    assert_eq!(h.engine.waiting_count(event_id).await, 1);

    // The cancelled record is retained for audit
    let record = h.engine.allocation(join_first.record.id).await.unwrap();
    assert_eq!(record.status, AllocationStatus::Cancelled);

    // Nobody else is waiting under that requester
    let missing = h.engine.leave_waitlist(event_id, first).await;
    assert!(matches!(missing, Err(EngineError::EntryNotFound { .. })));
}

#[tokio::test]
async fn cancel_twice_is_idempotent_and_releases_once() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();

    let first = h.engine.cancel(join.record.id, ada).await.unwrap();
    assert!(!first.already_cancelled);
    assert!(first.released_slot);

    let second = h.engine.cancel(join.record.id, ada).await.unwrap();
    assert!(second.already_cancelled);
    assert!(!second.released_slot);

    // At most one release reached the ledger
    assert_eq!(h.engine.available_slots(event_id).await, Some(1));
}

#[tokio::test]
async fn cancel_enforces_ownership_and_verified_state() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;
    let mallory = h.buyer("mallory@example.com").await;

    let join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();

    let forbidden = h.engine.cancel(join.record.id, mallory).await;
    assert!(matches!(forbidden, Err(EngineError::Forbidden(_))));

    // Once scanned at the gate the ticket can never be cancelled
    let payload = join.record.gate_payload();
    h.engine
        .verify_and_gate(join.record.id, payload)
        .await
        .unwrap();
    let blocked = h.engine.cancel(join.record.id, ada).await;
    assert!(matches!(blocked, Err(EngineError::AlreadyVerified(_))));
}

#[tokio::test]
async fn gate_scan_is_idempotent_and_exact() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 2).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    let payload = join.record.pass_payload.clone().unwrap();

    let first = h
        .engine
        .verify_and_gate(join.record.id, payload.clone())
        .await
        .unwrap();
    assert!(matches!(first, GateDecision::VerifiedOk { .. }));

    let second = h
        .engine
        .verify_and_gate(join.record.id, payload.clone())
        .await
        .unwrap();
    let GateDecision::AlreadyVerified { verified_at } = second else {
        panic!("double-tap must report AlreadyVerified, got {second:?}");
    };
    let record = h.engine.allocation(join.record.id).await.unwrap();
    assert_eq!(record.verified_at, Some(verified_at));

    // Near-miss payloads are rejected outright
    let forged = h
        .engine
        .verify_and_gate(join.record.id, format!("{payload} "))
        .await;
    assert!(matches!(forged, Err(EngineError::PassInvalid(_))));
}

#[tokio::test]
async fn waiting_records_cannot_pass_the_gate() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 0).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    let result = h
        .engine
        .verify_and_gate(join.record.id, join.record.gate_payload())
        .await;
    assert!(matches!(result, Err(EngineError::PassInvalid(_))));
}

#[tokio::test]
async fn gateway_failure_leaves_no_observable_state() {
    let h = harness_with(
        MockPaymentGateway::declining(),
        RecordingNotificationSink::new(),
    );
    let event_id = EventId::new();
    h.engine.open_event(event_id, 3).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let result = h.engine.join_or_book(event_id, ada, PRICE).await;
    assert!(matches!(result, Err(EngineError::Gateway(_))));

    // All-or-nothing: no record, no queue entry, no slot consumed
    assert_eq!(h.engine.available_slots(event_id).await, Some(3));
    assert_eq!(h.engine.waiting_count(event_id).await, 0);
    assert_eq!(h.engine.confirmed_count(event_id).await, 0);
}

#[tokio::test]
async fn unknown_requester_is_rejected_before_payment() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();

    let result = h
        .engine
        .join_or_book(event_id, RequesterId::new(), PRICE)
        .await;
    assert!(matches!(result, Err(EngineError::RequesterNotFound(_))));
    assert_eq!(h.engine.available_slots(event_id).await, Some(1));
}

#[tokio::test]
async fn duplicate_join_is_a_conflict() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 5).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    let second = h.engine.join_or_book(event_id, ada, PRICE).await;
    assert!(matches!(second, Err(EngineError::AlreadyJoined { .. })));
    assert_eq!(h.engine.confirmed_count(event_id).await, 1);
}

#[tokio::test]
async fn hold_then_capture_consumes_exactly_one_slot() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let held = h.engine.hold(event_id, ada, PRICE).await.unwrap();
    assert_eq!(held.status, AllocationStatus::Pending);
    assert_eq!(h.engine.available_slots(event_id).await, Some(1));

    let captured = h.engine.capture_payment(held.id, "pay_1").await.unwrap();
    assert_eq!(captured, CaptureOutcome::Confirmed);
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));

    // Re-capturing an already-confirmed record is a no-op
    let again = h.engine.capture_payment(held.id, "pay_1_retry").await.unwrap();
    assert_eq!(again, CaptureOutcome::AlreadyConfirmed);
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));
}

#[tokio::test]
async fn capture_without_slot_fails_then_heals_after_release() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;
    let bruno = h.buyer("bruno@example.com").await;

    let ada_join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    let held = h.engine.hold(event_id, bruno, PRICE).await.unwrap();

    let blocked = h.engine.capture_payment(held.id, "pay_b").await.unwrap();
    assert_eq!(blocked, CaptureOutcome::NoSlot);
    let record = h.engine.allocation(held.id).await.unwrap();
    assert_eq!(record.status, AllocationStatus::FailedNoSlot);

    // Ada frees the slot (no waitlist entry competes); the retry succeeds
    h.engine.cancel(ada_join.record.id, ada).await.unwrap();
    let retried = h.engine.capture_payment(held.id, "pay_b2").await.unwrap();
    assert_eq!(retried, CaptureOutcome::Confirmed);
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));
}

#[tokio::test]
async fn notifications_track_the_full_lifecycle() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;
    let bruno = h.buyer("bruno@example.com").await;

    let ada_join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    h.wait_for_notification("Seat confirmed").await;

    let bruno_join = h.engine.join_or_book(event_id, bruno, PRICE).await.unwrap();
    h.wait_for_notification("Added to waitlist").await;
    let queued = h
        .sink
        .sent()
        .into_iter()
        .find(|n| n.subject.contains("Added to waitlist"))
        .unwrap();
    assert!(queued.body.contains("Position #1"));
    assert_eq!(queued.to, ContactAddress::new("bruno@example.com"));

    h.engine.cancel(ada_join.record.id, ada).await.unwrap();
    h.wait_for_notification("Allocation cancelled").await;
    h.wait_for_notification("Promoted from waitlist").await;

    let promoted = h.engine.allocation(bruno_join.record.id).await.unwrap();
    assert_eq!(promoted.status, AllocationStatus::Confirmed);
}

#[tokio::test]
async fn failing_notification_sink_never_affects_state() {
    let h = harness_with(
        MockPaymentGateway::new(),
        RecordingNotificationSink::failing(),
    );
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;
    let bruno = h.buyer("bruno@example.com").await;

    let ada_join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();
    let bruno_join = h.engine.join_or_book(event_id, bruno, PRICE).await.unwrap();
    h.engine.cancel(ada_join.record.id, ada).await.unwrap();

    // Every transition completed despite total delivery failure
    let promoted = h.engine.allocation(bruno_join.record.id).await.unwrap();
    assert_eq!(promoted.status, AllocationStatus::Confirmed);
    assert_eq!(h.engine.available_slots(event_id).await, Some(0));
    assert!(h.sink.sent().is_empty());
}

#[tokio::test]
async fn rendered_pass_image_arrives_asynchronously() {
    let h = harness();
    let event_id = EventId::new();
    h.engine.open_event(event_id, 1).await.unwrap();
    let ada = h.buyer("ada@example.com").await;

    let join = h.engine.join_or_book(event_id, ada, PRICE).await.unwrap();

    // The image is attached by a feedback action after rendering completes
    let mut image = None;
    for _ in 0..200 {
        image = h
            .engine
            .allocation(join.record.id)
            .await
            .and_then(|record| record.pass_image);
        if image.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let image = image.expect("pass image never attached");
    assert!(image.ends_with(join.record.pass_payload.unwrap().as_bytes()));
}
