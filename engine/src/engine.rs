//! The allocation engine: imperative shell around the allocation reducer.
//!
//! Collaborator work happens here, in a strict order relative to state
//! transitions: identity resolution and payment-order creation complete
//! *before* a command is dispatched (a gateway failure therefore aborts with
//! no observable state), and refunds run on background tasks *after* a
//! cancellation is applied. The store serializes the transitions themselves,
//! so no engine method ever holds a lock across a collaborator call.

use crate::allocation::{
    AllocationAction, AllocationEnvironment, AllocationReducer, AllocationState, CaptureOutcome,
    CommandOutcome, GateDecision, Placement, PromotionOutcome, Rejection,
};
use crate::error::{EngineError, PassRejection};
use crate::identity::{DirectoryError, RequesterDirectory};
use crate::payment_gateway::PaymentGateway;
use crate::notify::NotificationSink;
use crate::render::PassRenderer;
use crate::types::{AllocationId, AllocationRecord, EventId, Money, OrderRef, RequesterId};
use seatline_core::environment::Clock;
use seatline_runtime::Store;
use std::sync::Arc;

/// What an admission produced: the record, and the queue position when the
/// request was waitlisted.
#[derive(Clone, Debug)]
pub struct JoinOutcome {
    /// The created allocation record
    pub record: AllocationRecord,
    /// FIFO position, present only for waitlisted requests
    pub position: Option<u32>,
}

/// What a cancellation produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Whether the record was already cancelled (idempotent repeat)
    pub already_cancelled: bool,
    /// Whether a slot was released back to the ledger
    pub released_slot: bool,
}

/// Orchestrates the slot ledger, waitlist and allocation records behind a
/// single store, with external collaborators at the edges.
#[derive(Clone)]
pub struct AllocationEngine {
    store: Store<AllocationReducer>,
    directory: Arc<dyn RequesterDirectory>,
    gateway: Arc<dyn PaymentGateway>,
}

impl AllocationEngine {
    /// Create an engine wired to the given collaborators.
    ///
    /// Must be called within a Tokio runtime (the store spawns its feedback
    /// worker).
    pub fn new(
        directory: Arc<dyn RequesterDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn PassRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let env = AllocationEnvironment::new(clock, notifier, renderer);
        Self {
            store: Store::new(AllocationReducer::new(), env, AllocationState::new()),
            directory,
            gateway,
        }
    }

    /// Register an event's total capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EventAlreadyOpen`] on repeat registration.
    pub async fn open_event(&self, event_id: EventId, total_slots: u32) -> Result<(), EngineError> {
        let outcome = self
            .store
            .send_then(
                AllocationAction::OpenEvent {
                    event_id,
                    total_slots,
                },
                |state| state.last_outcome.clone(),
            )
            .await;
        match outcome {
            Some(Ok(CommandOutcome::Opened { .. })) => Ok(()),
            Some(Err(rejection)) => Err(Self::rejection_error(rejection)),
            _ => Err(EngineError::Internal("unexpected open outcome")),
        }
    }

    /// Admit a buyer: resolve identity, create the payment order, then
    /// either confirm a slot or join the waitlist.
    ///
    /// A full event is not an error: the outcome carries the queue position
    /// instead.
    ///
    /// # Errors
    ///
    /// [`EngineError::RequesterNotFound`] for unknown requesters,
    /// [`EngineError::Gateway`] when order creation fails (no records are
    /// created), [`EngineError::EventNotFound`] /
    /// [`EngineError::AlreadyJoined`] from admission itself.
    pub async fn join_or_book(
        &self,
        event_id: EventId,
        requester_id: RequesterId,
        amount: Money,
    ) -> Result<JoinOutcome, EngineError> {
        let profile = self
            .directory
            .resolve(requester_id)
            .await
            .map_err(|DirectoryError::NotFound(id)| EngineError::RequesterNotFound(id))?;

        // Both confirmed and waiting buyers carry a live payment obligation,
        // so the order is created before the reservation attempt and
        // promotion needs no new payment step.
        let order = self.gateway.create_order(amount).await?;
        let order_ref = order.order_ref.clone();

        let allocation_id = AllocationId::new();
        let (outcome, record) = self
            .store
            .send_then(
                AllocationAction::Admit {
                    allocation_id,
                    event_id,
                    requester_id,
                    contact: profile.contact,
                    amount,
                    order_ref: order.order_ref,
                },
                move |state| {
                    (
                        state.last_outcome.clone(),
                        state.record(&allocation_id).cloned(),
                    )
                },
            )
            .await;

        match outcome {
            Some(Ok(CommandOutcome::Admitted { placement, .. })) => {
                let record =
                    record.ok_or(EngineError::Internal("admitted record not in store"))?;
                let position = match placement {
                    Placement::Confirmed => None,
                    Placement::Waitlisted { position } => Some(position),
                };
                Ok(JoinOutcome { record, position })
            },
            Some(Err(rejection)) => {
                // The order exists but no record does; hand the money back
                self.spawn_refund(order_ref, Some(amount));
                Err(Self::rejection_error(rejection))
            },
            _ => Err(EngineError::Internal("unexpected admit outcome")),
        }
    }

    /// Create a pending allocation without taking a slot; the slot is
    /// reserved at [`AllocationEngine::capture_payment`] time.
    ///
    /// # Errors
    ///
    /// Same identity/gateway/admission errors as
    /// [`AllocationEngine::join_or_book`].
    pub async fn hold(
        &self,
        event_id: EventId,
        requester_id: RequesterId,
        amount: Money,
    ) -> Result<AllocationRecord, EngineError> {
        let profile = self
            .directory
            .resolve(requester_id)
            .await
            .map_err(|DirectoryError::NotFound(id)| EngineError::RequesterNotFound(id))?;
        let order = self.gateway.create_order(amount).await?;
        let order_ref = order.order_ref.clone();

        let allocation_id = AllocationId::new();
        let (outcome, record) = self
            .store
            .send_then(
                AllocationAction::Hold {
                    allocation_id,
                    event_id,
                    requester_id,
                    contact: profile.contact,
                    amount,
                    order_ref: order.order_ref,
                },
                move |state| {
                    (
                        state.last_outcome.clone(),
                        state.record(&allocation_id).cloned(),
                    )
                },
            )
            .await;

        match outcome {
            Some(Ok(CommandOutcome::Held { .. })) => {
                record.ok_or(EngineError::Internal("held record not in store"))
            },
            Some(Err(rejection)) => {
                self.spawn_refund(order_ref, Some(amount));
                Err(Self::rejection_error(rejection))
            },
            _ => Err(EngineError::Internal("unexpected hold outcome")),
        }
    }

    /// Attach a gateway payment reference; for pending records this is the
    /// moment the slot is actually reserved.
    ///
    /// `CaptureOutcome::NoSlot` is a first-class outcome, not an error, and
    /// the capture may be retried once a slot frees up.
    ///
    /// # Errors
    ///
    /// [`EngineError::AllocationNotFound`] or
    /// [`EngineError::NotCapturable`] for cancelled records.
    pub async fn capture_payment(
        &self,
        allocation_id: AllocationId,
        payment_ref: impl Into<String>,
    ) -> Result<CaptureOutcome, EngineError> {
        let outcome = self
            .store
            .send_then(
                AllocationAction::CapturePayment {
                    allocation_id,
                    payment_ref: payment_ref.into(),
                },
                |state| state.last_outcome.clone(),
            )
            .await;
        match outcome {
            Some(Ok(CommandOutcome::Captured { outcome, .. })) => Ok(outcome),
            Some(Err(rejection)) => Err(Self::rejection_error(rejection)),
            _ => Err(EngineError::Internal("unexpected capture outcome")),
        }
    }

    /// Cancel an allocation. Repeat cancels succeed idempotently; a slot is
    /// released (and the waitlist drained) only on the first.
    ///
    /// A refund is issued on a background task after the cancellation is
    /// applied; refund failure never rolls it back.
    ///
    /// # Errors
    ///
    /// [`EngineError::AllocationNotFound`], [`EngineError::Forbidden`] for
    /// ownership mismatches, [`EngineError::AlreadyVerified`] for scanned
    /// tickets.
    pub async fn cancel(
        &self,
        allocation_id: AllocationId,
        requester_id: RequesterId,
    ) -> Result<CancelOutcome, EngineError> {
        let (outcome, refund) = self
            .store
            .send_then(
                AllocationAction::Cancel {
                    allocation_id,
                    requester_id,
                },
                move |state| {
                    (
                        state.last_outcome.clone(),
                        state
                            .record(&allocation_id)
                            .map(|record| (record.order_ref.clone(), record.amount)),
                    )
                },
            )
            .await;

        match outcome {
            Some(Ok(CommandOutcome::Cancelled {
                released, already, ..
            })) => {
                if !already {
                    if let Some((order_ref, amount)) = refund {
                        self.spawn_refund(order_ref, Some(amount));
                    }
                }
                Ok(CancelOutcome {
                    already_cancelled: already,
                    released_slot: released,
                })
            },
            Some(Err(rejection)) => Err(Self::rejection_error(rejection)),
            _ => Err(EngineError::Internal("unexpected cancel outcome")),
        }
    }

    /// Cancel a requester's WAITING entry for an event, by requester.
    ///
    /// # Errors
    ///
    /// [`EngineError::EntryNotFound`] when the requester has no waiting
    /// entry; otherwise the same errors as [`AllocationEngine::cancel`].
    pub async fn leave_waitlist(
        &self,
        event_id: EventId,
        requester_id: RequesterId,
    ) -> Result<CancelOutcome, EngineError> {
        let allocation_id = self
            .store
            .with_state(|state| {
                state
                    .waitlist
                    .find_waiting(&event_id, &requester_id)
                    .map(|entry| entry.allocation_id)
            })
            .await
            .ok_or(EngineError::EntryNotFound {
                event_id,
                requester_id,
            })?;
        self.cancel(allocation_id, requester_id).await
    }

    /// Try to promote the waitlist head into a free slot.
    ///
    /// Safe to call at any time: it performs its own fresh reserve, so a
    /// missed promotion after a crash merely leaves the freed slot available
    /// for the next request.
    ///
    /// # Errors
    ///
    /// Only [`EngineError::Internal`] on an uninterpretable outcome; every
    /// promotion result (including "nothing to do") is a success value.
    pub async fn auto_promote(&self, event_id: EventId) -> Result<PromotionOutcome, EngineError> {
        let outcome = self
            .store
            .send_then(AllocationAction::Promote { event_id }, |state| {
                state.last_outcome.clone()
            })
            .await;
        match outcome {
            Some(Ok(CommandOutcome::Promotion(promotion))) => Ok(promotion),
            Some(Err(rejection)) => Err(Self::rejection_error(rejection)),
            _ => Err(EngineError::Internal("unexpected promote outcome")),
        }
    }

    /// Idempotent gate scan: the presented text must exactly match the
    /// record's stored payload.
    ///
    /// A double-tap returns [`GateDecision::AlreadyVerified`] - a distinct
    /// success, never an error and never a second gate entry.
    ///
    /// # Errors
    ///
    /// [`EngineError::AllocationNotFound`] or [`EngineError::PassInvalid`]
    /// for unconfirmed records and payload mismatches.
    pub async fn verify_and_gate(
        &self,
        allocation_id: AllocationId,
        presented: impl Into<String>,
    ) -> Result<GateDecision, EngineError> {
        let outcome = self
            .store
            .send_then(
                AllocationAction::VerifyGate {
                    allocation_id,
                    presented: presented.into(),
                },
                |state| state.last_outcome.clone(),
            )
            .await;
        match outcome {
            Some(Ok(CommandOutcome::Gate(decision))) => Ok(decision),
            Some(Err(rejection)) => Err(Self::rejection_error(rejection)),
            _ => Err(EngineError::Internal("unexpected gate outcome")),
        }
    }

    /// A requester's current waitlist position, 0 if they are not waiting.
    pub async fn queue_position(&self, event_id: EventId, requester_id: RequesterId) -> u32 {
        self.store
            .with_state(|state| state.waitlist.position_of(&event_id, &requester_id))
            .await
    }

    /// Number of WAITING entries for an event.
    pub async fn waiting_count(&self, event_id: EventId) -> usize {
        self.store
            .with_state(|state| state.waitlist.waiting_count(&event_id))
            .await
    }

    /// Fetch an allocation record by id.
    pub async fn allocation(&self, allocation_id: AllocationId) -> Option<AllocationRecord> {
        self.store
            .with_state(|state| state.record(&allocation_id).cloned())
            .await
    }

    /// Remaining capacity for an event, `None` if unknown.
    pub async fn available_slots(&self, event_id: EventId) -> Option<u32> {
        self.store
            .with_state(|state| state.ledger.available(&event_id))
            .await
    }

    /// Total capacity for an event, `None` if unknown.
    pub async fn total_slots(&self, event_id: EventId) -> Option<u32> {
        self.store
            .with_state(|state| state.ledger.total(&event_id))
            .await
    }

    /// Number of records currently holding a reserved slot for an event.
    pub async fn confirmed_count(&self, event_id: EventId) -> usize {
        self.store
            .with_state(|state| state.confirmed_count(&event_id))
            .await
    }

    /// Best-effort refund on a background task; failure is logged only.
    fn spawn_refund(&self, order_ref: OrderRef, amount: Option<Money>) {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(error) = gateway.refund(&order_ref, amount).await {
                tracing::warn!(%order_ref, %error, "refund failed; manual follow-up required");
            }
        });
    }

    fn rejection_error(rejection: Rejection) -> EngineError {
        match rejection {
            Rejection::UnknownEvent(event_id) => EngineError::EventNotFound(event_id),
            Rejection::EventExists(event_id) => EngineError::EventAlreadyOpen(event_id),
            Rejection::UnknownAllocation(allocation_id) => {
                EngineError::AllocationNotFound(allocation_id)
            },
            Rejection::NotOwner(allocation_id) => EngineError::Forbidden(allocation_id),
            Rejection::Verified(allocation_id) => EngineError::AlreadyVerified(allocation_id),
            Rejection::AlreadyJoined {
                event_id,
                requester_id,
            } => EngineError::AlreadyJoined {
                event_id,
                requester_id,
            },
            Rejection::NotCapturable {
                allocation_id,
                status,
            } => EngineError::NotCapturable {
                allocation_id,
                status,
            },
            Rejection::GateNotConfirmed(_) => {
                EngineError::PassInvalid(PassRejection::NotConfirmed)
            },
            Rejection::GatePayloadMismatch(_) => {
                EngineError::PassInvalid(PassRejection::PayloadMismatch)
            },
        }
    }
}
