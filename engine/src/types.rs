//! Domain types for the Seatline allocation engine.
//!
//! This module contains the value objects and entities the engine operates
//! on: identifiers, money, the allocation record (a buyer's request for a
//! slot and its lifecycle state) and the waitlist queue entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a requester (a buyer)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(Uuid);

impl RequesterId {
    /// Creates a new random `RequesterId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequesterId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an allocation record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationId(Uuid);

impl AllocationId {
    /// Creates a new random `AllocationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AllocationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AllocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a waitlist queue entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random `EntryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Where a requester can be reached with status notifications.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactAddress(String);

impl ContactAddress {
    /// Creates a new contact address
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address is empty (nothing to deliver to)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment-gateway-assigned order reference attached to every allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef(String);

impl OrderRef {
    /// Creates an order reference from the gateway-assigned id
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Allocation Record
// ============================================================================

/// Lifecycle state of an allocation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    /// Created, slot not yet attempted (deferred-capture flow)
    Pending,
    /// Holds one reserved slot
    Confirmed,
    /// Queued on the waitlist, holds no slot
    Waiting,
    /// Terminal; retained for audit
    Cancelled,
    /// Payment capture found no free slot; may be retried
    FailedNoSlot,
}

impl AllocationStatus {
    /// Whether this status represents a record currently holding a slot
    #[must_use]
    pub const fn holds_slot(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Waiting => "WAITING",
            Self::Cancelled => "CANCELLED",
            Self::FailedNoSlot => "FAILED_NO_SLOT",
        };
        write!(f, "{label}")
    }
}

/// A buyer's request for one slot and its lifecycle state.
///
/// Created by admission or hold; mutated only by the allocation reducer.
/// Never deleted once confirmed or verified - `Cancelled` is terminal but
/// retained for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Record identity
    pub id: AllocationId,
    /// Event the slot belongs to
    pub event_id: EventId,
    /// The buyer
    pub requester_id: RequesterId,
    /// Captured at admission so later notifications need no directory lookup
    pub contact: ContactAddress,
    /// Payable amount; opaque to the engine
    pub amount: Money,
    /// Gateway order reference created before any slot work
    pub order_ref: OrderRef,
    /// Gateway payment id, attached once the buyer completes checkout
    pub payment_ref: Option<String>,
    /// Lifecycle state
    pub status: AllocationStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Exact text a gate scan must present; set when the record confirms
    pub pass_payload: Option<String>,
    /// Rendered pass image, attached asynchronously after confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_image: Option<Vec<u8>>,
    /// Gate-scan flag; set at most once, never reversible
    pub verified: bool,
    /// When the pass was scanned
    pub verified_at: Option<DateTime<Utc>>,
}

impl AllocationRecord {
    /// Creates a fresh record in the given starting status.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AllocationId,
        event_id: EventId,
        requester_id: RequesterId,
        contact: ContactAddress,
        amount: Money,
        order_ref: OrderRef,
        status: AllocationStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            requester_id,
            contact,
            amount,
            order_ref,
            payment_ref: None,
            status,
            created_at,
            pass_payload: None,
            pass_image: None,
            verified: false,
            verified_at: None,
        }
    }

    /// The deterministic gate-pass text bound to this record.
    ///
    /// Derived from the allocation, event and requester identities only, so
    /// it can be reconstructed for records that predate payload storage.
    #[must_use]
    pub fn gate_payload(&self) -> String {
        format!(
            "Allocation ID: {}\nEvent ID: {}\nRequester ID: {}",
            self.id, self.event_id, self.requester_id
        )
    }
}

// ============================================================================
// Waitlist Queue Entry
// ============================================================================

/// Lifecycle state of a waitlist queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Holding a dense FIFO position, waiting for a slot
    Waiting,
    /// Promoted; position holds the terminal sentinel 0
    Booked,
    /// Removed by an explicit cancel
    Cancelled,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "WAITING",
            Self::Booked => "BOOKED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{label}")
    }
}

/// A FIFO waitlist placeholder linked 1:1 to an allocation record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry identity
    pub id: EntryId,
    /// Event whose waitlist this entry sits on
    pub event_id: EventId,
    /// Back-reference to the allocation record, exclusively owned
    pub allocation_id: AllocationId,
    /// The waiting buyer
    pub requester_id: RequesterId,
    /// 1-based dense position among WAITING entries; 0 once booked
    pub position: u32,
    /// Lifecycle state
    pub status: EntryStatus,
    /// FIFO ordering key
    pub created_at: DateTime<Utc>,
    /// Insertion sequence; breaks FIFO ties when timestamps collide
    pub sequence: u64,
}
