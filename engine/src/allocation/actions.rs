//! Actions processed by the allocation reducer.

use crate::types::{AllocationId, ContactAddress, EventId, Money, OrderRef, RequesterId};

/// Actions for the allocation state machine.
///
/// Commands arrive from the engine after all collaborator work (identity
/// resolution, payment-order creation) has already succeeded; feedback
/// events arrive from effects the reducer itself emitted.
#[derive(Clone, Debug)]
pub enum AllocationAction {
    // Commands
    /// Register an event's total capacity
    OpenEvent {
        /// Event to open
        event_id: EventId,
        /// Immutable total capacity
        total_slots: u32,
    },

    /// Admit a paid-up request: confirm a slot now or join the waitlist
    Admit {
        /// Pre-generated record id
        allocation_id: AllocationId,
        /// Target event
        event_id: EventId,
        /// The buyer
        requester_id: RequesterId,
        /// Where to send status notifications
        contact: ContactAddress,
        /// Payable amount (opaque to the engine)
        amount: Money,
        /// Gateway order created before this command was dispatched
        order_ref: OrderRef,
    },

    /// Create a pending record without taking a slot (deferred capture)
    Hold {
        /// Pre-generated record id
        allocation_id: AllocationId,
        /// Target event
        event_id: EventId,
        /// The buyer
        requester_id: RequesterId,
        /// Where to send status notifications
        contact: ContactAddress,
        /// Payable amount (opaque to the engine)
        amount: Money,
        /// Gateway order created before this command was dispatched
        order_ref: OrderRef,
    },

    /// Attach a gateway payment id; reserve the slot for pending records
    CapturePayment {
        /// Target record
        allocation_id: AllocationId,
        /// Gateway payment reference
        payment_ref: String,
    },

    /// Buyer-initiated cancellation
    Cancel {
        /// Record to cancel
        allocation_id: AllocationId,
        /// Must match the record's owner
        requester_id: RequesterId,
    },

    /// Try to promote the waitlist head into a free slot
    Promote {
        /// Event whose waitlist is drained
        event_id: EventId,
    },

    /// Gate scan presenting a pass payload
    VerifyGate {
        /// Scanned record
        allocation_id: AllocationId,
        /// Raw text from the scanner
        presented: String,
    },

    // Feedback events
    /// A pass image finished rendering
    PassRendered {
        /// Record the image belongs to
        allocation_id: AllocationId,
        /// Rendered blob
        image: Vec<u8>,
    },
}
