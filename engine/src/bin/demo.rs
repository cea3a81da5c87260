//! Seatline Demo
//!
//! Walks the allocation engine through its core scenario:
//! - Event opened with a single slot
//! - First buyer confirms, second and third land on the waitlist
//! - The confirmed buyer cancels; the waitlist head is promoted and the
//!   queue reindexed
//! - The promoted buyer's pass is verified at the gate (double-tap included)
//! - A deferred-capture hold confirms against a second event
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//! ```

use seatline_core::environment::SystemClock;
use seatline_engine::{
    AllocationEngine, Config, EventId, Money,
    identity::InMemoryRequesterDirectory,
    notify::{DiscardNotificationSink, LogNotificationSink, NotificationSink},
    payment_gateway::MockPaymentGateway,
    render::InlinePassRenderer,
    types::ContactAddress,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
#[allow(clippy::too_many_lines)] // Linear walkthrough
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    seatline_engine::metrics::register_engine_metrics();

    println!("\n============================================");
    println!("   Seatline - Allocation Engine Demo");
    println!("============================================\n");

    // Wire collaborators
    let directory = InMemoryRequesterDirectory::shared();
    let gateway = {
        let mut gateway = MockPaymentGateway::new()
            .with_latency(Duration::from_millis(config.gateway.simulated_latency_ms));
        if config.gateway.decline_all {
            gateway = MockPaymentGateway::declining();
        }
        Arc::new(gateway)
    };
    let notifier: Arc<dyn NotificationSink> = if config.notifications.enabled {
        LogNotificationSink::shared()
    } else {
        DiscardNotificationSink::shared()
    };
    let engine = AllocationEngine::new(
        directory.clone(),
        gateway,
        notifier,
        InlinePassRenderer::shared(),
        Arc::new(SystemClock),
    );

    let ada = directory
        .register(ContactAddress::new("ada@example.com"))
        .await;
    let bruno = directory
        .register(ContactAddress::new("bruno@example.com"))
        .await;
    let chen = directory
        .register(ContactAddress::new("chen@example.com"))
        .await;

    // Step 1: open an event with a single slot
    println!("1. Opening event with capacity 1...");
    let event_id = EventId::new();
    engine.open_event(event_id, 1).await?;
    println!("   event: {event_id}");
    println!("   available: {:?}\n", engine.available_slots(event_id).await);

    // Step 2: first buyer takes the slot
    println!("2. Ada joins...");
    let ada_join = engine
        .join_or_book(event_id, ada, Money::from_cents(4_500))
        .await?;
    println!("   status: {}", ada_join.record.status);
    println!("   available: {:?}\n", engine.available_slots(event_id).await);

    // Step 3: the event is full; later buyers queue up
    println!("3. Bruno and Chen join a full event...");
    let bruno_join = engine
        .join_or_book(event_id, bruno, Money::from_cents(4_500))
        .await?;
    let chen_join = engine
        .join_or_book(event_id, chen, Money::from_cents(4_500))
        .await?;
    println!(
        "   bruno: {} at position {:?}",
        bruno_join.record.status, bruno_join.position
    );
    println!(
        "   chen:  {} at position {:?}",
        chen_join.record.status, chen_join.position
    );
    println!("   waiting: {}\n", engine.waiting_count(event_id).await);

    // Step 4: cancellation frees the slot and promotes the head
    println!("4. Ada cancels; the freed slot goes to the waitlist head...");
    let receipt = engine.cancel(ada_join.record.id, ada).await?;
    println!("   released slot: {}", receipt.released_slot);

    let bruno_record = engine
        .allocation(bruno_join.record.id)
        .await
        .ok_or("promoted record vanished")?;
    println!("   bruno is now: {}", bruno_record.status);
    println!(
        "   chen moved up to position {}",
        engine.queue_position(event_id, chen).await
    );
    println!("   available: {:?}\n", engine.available_slots(event_id).await);

    // Step 5: gate verification, double-tap included
    println!("5. Scanning Bruno's pass at the gate...");
    let payload = bruno_record
        .pass_payload
        .clone()
        .ok_or("confirmed record has no payload")?;
    let first = engine.verify_and_gate(bruno_record.id, payload.clone()).await?;
    let second = engine.verify_and_gate(bruno_record.id, payload).await?;
    println!("   first scan:  {first:?}");
    println!("   second scan: {second:?}\n");

    // Step 6: deferred capture against a fresh event
    println!("6. Hold + capture against a second event...");
    let second_event = EventId::new();
    engine.open_event(second_event, 10).await?;
    let held = engine.hold(second_event, ada, Money::from_cents(9_900)).await?;
    println!("   held: {}", held.status);
    let captured = engine.capture_payment(held.id, "pay_demo_1").await?;
    println!("   capture outcome: {captured:?}");

    let record = engine
        .allocation(held.id)
        .await
        .ok_or("captured record vanished")?;
    println!("\n   final record:\n{}", serde_json::to_string_pretty(&record)?);

    // Let fire-and-forget effects (notifications, rendering) flush
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("\nDone.");
    Ok(())
}
