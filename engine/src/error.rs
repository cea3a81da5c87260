//! Engine error taxonomy.
//!
//! Capacity exhaustion is deliberately absent: a full event routes the
//! request onto the waitlist (or yields a `FailedNoSlot` outcome during
//! payment capture), it never surfaces as an error. Notification and render
//! failures are swallowed after the fact and have no representation here.

use crate::payment_gateway::GatewayError;
use crate::types::{AllocationId, AllocationStatus, EventId, RequesterId};

/// Errors returned by [`crate::AllocationEngine`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requester has no profile in the directory
    #[error("requester not found: {0}")]
    RequesterNotFound(RequesterId),

    /// The event has never been opened with the ledger
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Capacity was already registered for this event
    #[error("event already open: {0}")]
    EventAlreadyOpen(EventId),

    /// No allocation record exists under this id
    #[error("allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// No waiting entry exists for this requester on this event
    #[error("no waiting entry for requester {requester_id} on event {event_id}")]
    EntryNotFound {
        /// Event whose waitlist was searched
        event_id: EventId,
        /// Requester with no entry
        requester_id: RequesterId,
    },

    /// The allocation belongs to a different requester
    #[error("allocation {0} belongs to another requester")]
    Forbidden(AllocationId),

    /// A scanned ticket can never be cancelled
    #[error("allocation {0} was already verified at the gate")]
    AlreadyVerified(AllocationId),

    /// The requester already holds an active allocation for this event
    #[error("requester {requester_id} already holds an active allocation for event {event_id}")]
    AlreadyJoined {
        /// Event joined twice
        event_id: EventId,
        /// Offending requester
        requester_id: RequesterId,
    },

    /// A gate scan presented a payload that cannot be accepted
    #[error("gate pass rejected: {0}")]
    PassInvalid(PassRejection),

    /// Payment cannot be captured for a record in this state
    #[error("allocation {allocation_id} is not capturable in status {status}")]
    NotCapturable {
        /// Record the capture targeted
        allocation_id: AllocationId,
        /// Its current status
        status: AllocationStatus,
    },

    /// The payment gateway failed; no records were created
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The state machine produced an outcome the engine cannot interpret
    #[error("internal state error: {0}")]
    Internal(&'static str),
}

/// Why a gate scan was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassRejection {
    /// The record is not in the `Confirmed` state
    NotConfirmed,
    /// The presented text does not exactly match the stored payload
    PayloadMismatch,
}

impl std::fmt::Display for PassRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfirmed => write!(f, "allocation is not confirmed"),
            Self::PayloadMismatch => write!(f, "payload does not match"),
        }
    }
}
