//! Seatline - a slot allocation and waitlist promotion engine.
//!
//! Seatline sells a fixed number of slots for an event to many concurrently
//! arriving buyers. Under concurrent requests it decides who gets a slot
//! now, who waits, and who is promoted automatically when a slot frees up,
//! while guaranteeing:
//!
//! - Confirmed allocations never exceed an event's capacity
//! - Inventory is never lost to read-modify-write races
//! - The waiting list stays a strict arrival-order FIFO with dense
//!   positions, drained automatically as cancellations occur
//!
//! # Architecture
//!
//! ```text
//!                  AllocationEngine (imperative shell)
//!   identity ──┐        │ commands            │ reads
//!   payment ───┤        ▼                     ▼
//!              │   ┌─────────────────────────────────┐
//!              └──►│   Store (single-writer guard)   │
//!                  │  ┌───────────────────────────┐  │
//!                  │  │    AllocationReducer      │  │
//!                  │  │  SlotLedger  WaitlistQueue│  │
//!                  │  │  AllocationRecords        │  │
//!                  │  └───────────────────────────┘  │
//!                  └──────────────┬──────────────────┘
//!                                 │ effects (after transition)
//!                        notification sink, pass renderer
//! ```
//!
//! # Key Properties
//!
//! ## Linearizable capacity accounting
//!
//! `try_reserve` is a conditional decrement executed inside a reduction;
//! the store's write guard serializes reductions, so two buyers competing
//! for the last slot can never both win. Nothing in the engine ever reads
//! the counter and writes it back.
//!
//! ## Collaborators off the critical path
//!
//! The payment order is created *before* the reservation attempt (a gateway
//! failure aborts with no records created), and notifications/rendering run
//! as fire-and-forget effects *after* the transition is applied - a slow or
//! failing collaborator never blocks the critical section and never rolls
//! back a completed transition.
//!
//! ## Self-healing promotion
//!
//! Promotion always performs its own fresh reserve, so it is safe to retry
//! or skip: a missed promotion leaves the freed slot available for the next
//! request rather than losing it. The dangling-entry repair path compensates
//! its reservation and stays distinguishable in logs and metrics.

pub mod allocation;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod payment_gateway;
pub mod render;
pub mod types;
pub mod waitlist;

mod engine;

pub use allocation::{
    AllocationAction, AllocationEnvironment, AllocationReducer, AllocationState, CaptureOutcome,
    CommandOutcome, GateDecision, Placement, PromotionOutcome,
};
pub use config::Config;
pub use engine::{AllocationEngine, CancelOutcome, JoinOutcome};
pub use error::{EngineError, PassRejection};
pub use types::*;
