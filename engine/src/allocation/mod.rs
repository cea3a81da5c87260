//! The allocation state machine: state, actions, reducer, environment.
//!
//! This module owns every lifecycle transition for allocation records and
//! waitlist entries. The engine (`crate::engine`) is the imperative shell
//! around it: collaborator calls happen there, transitions happen here.
//!
//! # State machine
//!
//! ```text
//! Admit ──────────► CONFIRMED ──────► CANCELLED (terminal, retained)
//!   │                  ▲   │
//!   │ (event full)     │   └─ verified: one-way flag, blocks cancel
//!   ▼                  │
//! WAITING ─────────────┘  promotion (single-winner per freed slot)
//!   │
//!   └──────────────────► CANCELLED (queue entry removed, reindexed)
//!
//! Hold ───► PENDING ──capture──► CONFIRMED | FAILED_NO_SLOT (retryable)
//! ```

mod actions;
mod environment;
mod reducer;
mod types;


pub use actions::AllocationAction;
pub use environment::AllocationEnvironment;
pub use reducer::AllocationReducer;
pub use types::{
    AllocationState, CaptureOutcome, CommandOutcome, CommandResult, GateDecision, Placement,
    PromotionOutcome, Rejection,
};
