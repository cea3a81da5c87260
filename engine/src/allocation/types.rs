//! State and outcome types for the allocation state machine.

use crate::ledger::SlotLedger;
use crate::types::{
    AllocationId, AllocationRecord, AllocationStatus, EntryId, EventId, RequesterId,
};
use crate::waitlist::WaitlistQueue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Result of the most recent command reduction.
pub type CommandResult = Result<CommandOutcome, Rejection>;

/// Where an admitted request landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// A slot was free; the record is confirmed
    Confirmed,
    /// The event was full; the record waits at this queue position
    Waitlisted {
        /// 1-based FIFO position
        position: u32,
    },
}

/// Outcome of a payment capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A slot was reserved and the record confirmed
    Confirmed,
    /// No slot was free; the record is `FailedNoSlot` and capture may be
    /// retried once a slot frees up
    NoSlot,
    /// The record is waiting; the payment reference was attached for use at
    /// promotion time
    AttachedToWaiting,
    /// The record was already confirmed; nothing to do
    AlreadyConfirmed,
}

/// Outcome of a promotion attempt.
///
/// Exactly one waiting entry is promoted per successful release/reserve
/// pair; every other variant consumed nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The head entry's record was confirmed with the freed slot
    Promoted {
        /// Confirmed record
        allocation_id: AllocationId,
        /// Promoted buyer
        requester_id: RequesterId,
    },
    /// No waiting entry existed
    QueueEmpty,
    /// No slot was free to promote into
    NoSlotFree,
    /// The head entry had no backing record; it was removed and the
    /// reserved slot restored (defensive self-repair, not a promotion)
    RepairedDanglingEntry {
        /// Removed entry
        entry_id: EntryId,
    },
    /// The head entry's record was already confirmed by a duplicate
    /// trigger; the entry was marked booked and the spent slot released
    AlreadyConfirmed {
        /// Already-confirmed record
        allocation_id: AllocationId,
    },
}

/// Outcome of a gate scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// First successful scan; the record is now verified
    VerifiedOk {
        /// When the scan was recorded
        verified_at: DateTime<Utc>,
    },
    /// The record was already verified; a scanner double-tap, not an error
    AlreadyVerified {
        /// When the first scan was recorded
        verified_at: DateTime<Utc>,
    },
}

/// Why a command was rejected without changing state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The event has never been opened
    UnknownEvent(EventId),
    /// Capacity was already registered for this event
    EventExists(EventId),
    /// No record exists under this id
    UnknownAllocation(AllocationId),
    /// The record belongs to a different requester
    NotOwner(AllocationId),
    /// A verified record can never be cancelled
    Verified(AllocationId),
    /// The requester already holds an active allocation for this event
    AlreadyJoined {
        /// Event joined twice
        event_id: EventId,
        /// Offending requester
        requester_id: RequesterId,
    },
    /// Payment cannot be captured for a record in this state
    NotCapturable {
        /// Record the capture targeted
        allocation_id: AllocationId,
        /// Its current status
        status: AllocationStatus,
    },
    /// Gate scan against a record that is not confirmed
    GateNotConfirmed(AllocationId),
    /// Gate scan presented text that does not match the stored payload
    GatePayloadMismatch(AllocationId),
}

/// Outcome of a successfully applied command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Capacity registered
    Opened {
        /// Newly opened event
        event_id: EventId,
    },
    /// Admission decided
    Admitted {
        /// Created record
        allocation_id: AllocationId,
        /// Confirmed or waitlisted
        placement: Placement,
    },
    /// Deferred-capture record created, no slot taken
    Held {
        /// Created record
        allocation_id: AllocationId,
    },
    /// Payment reference processed
    Captured {
        /// Target record
        allocation_id: AllocationId,
        /// What the capture did
        outcome: CaptureOutcome,
    },
    /// Cancellation applied (idempotently on repeat calls)
    Cancelled {
        /// Cancelled record
        allocation_id: AllocationId,
        /// Whether a slot was released back to the ledger
        released: bool,
        /// Whether the record was already cancelled (no-op repeat)
        already: bool,
    },
    /// Promotion attempt finished
    Promotion(PromotionOutcome),
    /// Gate scan accepted
    Gate(GateDecision),
}

/// All state owned by the allocation reducer.
///
/// Mutated only through reductions; the store's write guard serializes them,
/// which makes `ledger` updates linearizable without caller-side locking.
#[derive(Clone, Debug, Default)]
pub struct AllocationState {
    /// Authoritative remaining-capacity counters
    pub ledger: SlotLedger,
    /// Per-event FIFO waitlists
    pub waitlist: WaitlistQueue,
    /// Every allocation record by id, terminal states included
    pub records: HashMap<AllocationId, AllocationRecord>,
    /// Active (non-cancelled) allocation per `(event, requester)`; enforces
    /// the one-active-allocation rule
    pub active_by_requester: HashMap<(EventId, RequesterId), AllocationId>,
    /// Result of the most recent command reduction, read back by the engine
    /// under the same dispatch guard that produced it
    pub last_outcome: Option<CommandResult>,
}

impl AllocationState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record by id
    #[must_use]
    pub fn record(&self, allocation_id: &AllocationId) -> Option<&AllocationRecord> {
        self.records.get(allocation_id)
    }

    /// Number of records currently holding a reserved slot for an event
    #[must_use]
    pub fn confirmed_count(&self, event_id: &EventId) -> usize {
        self.records
            .values()
            .filter(|record| record.event_id == *event_id && record.status.holds_slot())
            .count()
    }
}
