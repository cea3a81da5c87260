//! Business metrics for the allocation engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `seatline_allocations_total{outcome}` - Admissions by outcome
//!   (confirmed, waitlisted)
//! - `seatline_promotions_total{kind}` - Promotion attempts by kind
//!   (promoted, idempotent, repaired, no_slot, queue_empty)
//! - `seatline_cancellations_total` - Completed cancellations
//! - `seatline_ledger_clamped_releases_total` - Releases clamped at total
//!   capacity (correctness warning, likely double release)
//! - `seatline_gate_scans_total{result}` - Gate scans (ok, duplicate,
//!   rejected)
//!
//! ## Gauges
//! - `seatline_waitlist_depth{event_id}` - Current waiting entries per event

use metrics::{describe_counter, describe_gauge};

/// Initialize and register all business metric descriptions.
///
/// This should be called once at application startup, before any metrics
/// are recorded.
pub fn register_engine_metrics() {
    describe_counter!(
        "seatline_allocations_total",
        "Total admissions by outcome (confirmed, waitlisted)"
    );
    describe_counter!(
        "seatline_promotions_total",
        "Total promotion attempts by kind (promoted, idempotent, repaired, no_slot, queue_empty)"
    );
    describe_counter!(
        "seatline_cancellations_total",
        "Total completed cancellations"
    );
    describe_counter!(
        "seatline_ledger_clamped_releases_total",
        "Slot releases clamped at total capacity; indicates a double release"
    );
    describe_counter!(
        "seatline_gate_scans_total",
        "Total gate scans by result (ok, duplicate, rejected)"
    );
    describe_gauge!(
        "seatline_waitlist_depth",
        "Current number of waiting entries per event"
    );

    tracing::info!("Engine metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an admission that confirmed immediately.
pub fn record_allocation_confirmed() {
    metrics::counter!("seatline_allocations_total", "outcome" => "confirmed").increment(1);
}

/// Record an admission that was routed to the waitlist.
pub fn record_allocation_waitlisted() {
    metrics::counter!("seatline_allocations_total", "outcome" => "waitlisted").increment(1);
}

/// Record a completed cancellation.
pub fn record_cancellation() {
    metrics::counter!("seatline_cancellations_total").increment(1);
}

/// Record a promotion attempt by kind.
///
/// `repaired` marks the defensive self-repair path (dangling queue entry),
/// which must stay distinguishable from a normal promotion.
pub fn record_promotion(kind: &'static str) {
    metrics::counter!("seatline_promotions_total", "kind" => kind).increment(1);
}

/// Record a slot release that was clamped at total capacity.
pub fn record_clamped_release() {
    metrics::counter!("seatline_ledger_clamped_releases_total").increment(1);
}

/// Record a gate scan by result.
pub fn record_gate_scan(result: &'static str) {
    metrics::counter!("seatline_gate_scans_total", "result" => result).increment(1);
}

/// Update the waitlist depth gauge for an event.
#[allow(clippy::cast_precision_loss)]
pub fn update_waitlist_depth(event_id: &str, depth: usize) {
    metrics::gauge!("seatline_waitlist_depth", "event_id" => event_id.to_owned())
        .set(depth as f64);
}
