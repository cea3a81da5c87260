//! Slot ledger: the authoritative remaining-capacity counter per event.
//!
//! `try_reserve` and `release` are single conditional mutations. The ledger
//! lives inside the allocation state owned by the store, whose write guard
//! serializes every mutation, so two callers competing for the last slot can
//! never both win. No caller ever reads the counter and writes it back.

use crate::metrics as engine_metrics;
use crate::types::EventId;
use std::collections::HashMap;

/// Capacity counters for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotCount {
    total: u32,
    available: u32,
}

/// Per-event slot accounting.
///
/// Invariant: `0 <= available <= total` for every open event, at every
/// observable instant.
#[derive(Clone, Debug, Default)]
pub struct SlotLedger {
    slots: HashMap<EventId, SlotCount>,
}

impl SlotLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event's capacity. All slots start available.
    ///
    /// Returns `false` (and changes nothing) if the event is already open;
    /// total capacity is immutable after registration.
    pub fn open(&mut self, event_id: EventId, total: u32) -> bool {
        if self.slots.contains_key(&event_id) {
            return false;
        }
        self.slots.insert(
            event_id,
            SlotCount {
                total,
                available: total,
            },
        );
        true
    }

    /// Whether capacity has been registered for this event
    #[must_use]
    pub fn is_open(&self, event_id: &EventId) -> bool {
        self.slots.contains_key(event_id)
    }

    /// Atomically take one slot iff any is available.
    ///
    /// Returns whether the reservation succeeded. Unknown events never have
    /// capacity.
    pub fn try_reserve(&mut self, event_id: &EventId) -> bool {
        match self.slots.get_mut(event_id) {
            Some(count) if count.available > 0 => {
                count.available -= 1;
                true
            },
            _ => false,
        }
    }

    /// Return one slot, clamped so `available` never exceeds `total`.
    ///
    /// The clamp guards against double-release bugs rather than masking
    /// them: a clamped release is logged as a correctness warning and
    /// counted, not silently ignored.
    pub fn release(&mut self, event_id: &EventId) {
        let Some(count) = self.slots.get_mut(event_id) else {
            tracing::warn!(%event_id, "release for unknown event ignored");
            engine_metrics::record_clamped_release();
            return;
        };
        if count.available >= count.total {
            tracing::warn!(
                %event_id,
                total = count.total,
                "release clamped: available already at total, likely double release"
            );
            engine_metrics::record_clamped_release();
            return;
        }
        count.available += 1;
    }

    /// Remaining capacity for an event, `None` if unknown
    #[must_use]
    pub fn available(&self, event_id: &EventId) -> Option<u32> {
        self.slots.get(event_id).map(|count| count.available)
    }

    /// Total capacity for an event, `None` if unknown
    #[must_use]
    pub fn total(&self, event_id: &EventId) -> Option<u32> {
        self.slots.get(event_id).map(|count| count.total)
    }
}
