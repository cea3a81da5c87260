//! The allocation state machine.
//!
//! Every lifecycle transition lives here as a pure reduction:
//! `PENDING → {CONFIRMED | WAITING} → CANCELLED`, `WAITING → CONFIRMED` via
//! promotion, and the one-way `verified` flag settable only from
//! `CONFIRMED`. The store's write guard serializes reductions, so the
//! conditional ledger updates inside them can never race each other.
//!
//! Slow collaborators never appear in a reduction: payment and identity run
//! before a command is dispatched, and notification/rendering are returned
//! as fire-and-forget effects executed after the transition is applied.

use crate::allocation::environment::AllocationEnvironment;
use crate::allocation::{
    AllocationAction, AllocationState, CaptureOutcome, CommandOutcome, GateDecision, Placement,
    PromotionOutcome, Rejection,
};
use crate::metrics as engine_metrics;
use crate::notify::Notification;
use crate::types::{
    AllocationId, AllocationRecord, AllocationStatus, ContactAddress, EventId, Money, OrderRef,
    RequesterId,
};
use seatline_core::effect::Effect;
use seatline_core::reducer::Reducer;
use seatline_core::{SmallVec, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[Effect<AllocationAction>; 4]>;

/// Reducer for the allocation state machine.
///
/// Owns every invariant: confirmed records never exceed capacity, waiting
/// positions stay a dense FIFO sequence, cancellation releases at most one
/// slot, and promotion is single-winner per freed slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocationReducer;

impl AllocationReducer {
    /// Creates a new `AllocationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fire-and-forget notification effect. Delivery failure is logged and
    /// swallowed; it never reaches the state machine.
    fn notify_effect(
        env: &AllocationEnvironment,
        to: ContactAddress,
        subject: String,
        body: String,
    ) -> Effect<AllocationAction> {
        let notifier = Arc::clone(&env.notifier);
        Effect::Future(Box::pin(async move {
            let notification = Notification { to, subject, body };
            if let Err(error) = notifier.notify(notification).await {
                tracing::warn!(%error, "notification delivery failed; ignored");
            }
            None
        }))
    }

    /// Render the pass image in the background and attach it via feedback.
    /// A render failure leaves the record confirmed without an image.
    fn render_effect(
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        payload: String,
    ) -> Effect<AllocationAction> {
        let renderer = Arc::clone(&env.renderer);
        Effect::Future(Box::pin(async move {
            match renderer.render(&payload).await {
                Ok(image) => Some(AllocationAction::PassRendered {
                    allocation_id,
                    image,
                }),
                Err(error) => {
                    tracing::warn!(
                        %allocation_id,
                        %error,
                        "pass rendering failed; continuing without image"
                    );
                    None
                },
            }
        }))
    }

    fn open_event(state: &mut AllocationState, event_id: EventId, total_slots: u32) -> Effects {
        if state.ledger.open(event_id, total_slots) {
            tracing::info!(%event_id, total_slots, "event opened");
            state.last_outcome = Some(Ok(CommandOutcome::Opened { event_id }));
        } else {
            state.last_outcome = Some(Err(Rejection::EventExists(event_id)));
        }
        SmallVec::new()
    }

    #[allow(clippy::too_many_arguments)]
    fn admit(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        event_id: EventId,
        requester_id: RequesterId,
        contact: ContactAddress,
        amount: Money,
        order_ref: OrderRef,
    ) -> Effects {
        if !state.ledger.is_open(&event_id) {
            state.last_outcome = Some(Err(Rejection::UnknownEvent(event_id)));
            return SmallVec::new();
        }
        if state
            .active_by_requester
            .contains_key(&(event_id, requester_id))
        {
            state.last_outcome = Some(Err(Rejection::AlreadyJoined {
                event_id,
                requester_id,
            }));
            return SmallVec::new();
        }

        let now = env.clock.now();
        let mut record = AllocationRecord::new(
            allocation_id,
            event_id,
            requester_id,
            contact.clone(),
            amount,
            order_ref,
            AllocationStatus::Pending,
            now,
        );

        if state.ledger.try_reserve(&event_id) {
            record.status = AllocationStatus::Confirmed;
            let payload = record.gate_payload();
            record.pass_payload = Some(payload.clone());
            state.records.insert(allocation_id, record);
            state
                .active_by_requester
                .insert((event_id, requester_id), allocation_id);

            engine_metrics::record_allocation_confirmed();
            tracing::info!(%allocation_id, %event_id, %requester_id, "allocation confirmed");
            state.last_outcome = Some(Ok(CommandOutcome::Admitted {
                allocation_id,
                placement: Placement::Confirmed,
            }));

            smallvec![
                Self::render_effect(env, allocation_id, payload),
                Self::notify_effect(
                    env,
                    contact,
                    format!("Seat confirmed for event {event_id}"),
                    format!("Your seat is confirmed.\nAllocation ID: {allocation_id}"),
                ),
            ]
        } else {
            record.status = AllocationStatus::Waiting;
            state.records.insert(allocation_id, record);
            state
                .active_by_requester
                .insert((event_id, requester_id), allocation_id);
            let entry = state
                .waitlist
                .enqueue(event_id, allocation_id, requester_id, now);

            engine_metrics::record_allocation_waitlisted();
            engine_metrics::update_waitlist_depth(
                &event_id.to_string(),
                state.waitlist.waiting_count(&event_id),
            );
            tracing::info!(
                %allocation_id,
                %event_id,
                %requester_id,
                position = entry.position,
                "event full; request waitlisted"
            );
            state.last_outcome = Some(Ok(CommandOutcome::Admitted {
                allocation_id,
                placement: Placement::Waitlisted {
                    position: entry.position,
                },
            }));

            smallvec![Self::notify_effect(
                env,
                contact,
                format!("Added to waitlist for event {event_id}"),
                format!("You were added to the waiting list.\nPosition #{}", entry.position),
            )]
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn hold(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        event_id: EventId,
        requester_id: RequesterId,
        contact: ContactAddress,
        amount: Money,
        order_ref: OrderRef,
    ) -> Effects {
        if !state.ledger.is_open(&event_id) {
            state.last_outcome = Some(Err(Rejection::UnknownEvent(event_id)));
            return SmallVec::new();
        }
        if state
            .active_by_requester
            .contains_key(&(event_id, requester_id))
        {
            state.last_outcome = Some(Err(Rejection::AlreadyJoined {
                event_id,
                requester_id,
            }));
            return SmallVec::new();
        }

        let record = AllocationRecord::new(
            allocation_id,
            event_id,
            requester_id,
            contact,
            amount,
            order_ref,
            AllocationStatus::Pending,
            env.clock.now(),
        );
        state.records.insert(allocation_id, record);
        state
            .active_by_requester
            .insert((event_id, requester_id), allocation_id);

        tracing::info!(%allocation_id, %event_id, "pending allocation held; slot deferred to capture");
        state.last_outcome = Some(Ok(CommandOutcome::Held { allocation_id }));
        SmallVec::new()
    }

    fn capture_payment(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        payment_ref: String,
    ) -> Effects {
        let Some(record) = state.records.get_mut(&allocation_id) else {
            state.last_outcome = Some(Err(Rejection::UnknownAllocation(allocation_id)));
            return SmallVec::new();
        };

        record.payment_ref = Some(payment_ref);
        let status = record.status;
        let event_id = record.event_id;
        let contact = record.contact.clone();

        match status {
            AllocationStatus::Confirmed => {
                state.last_outcome = Some(Ok(CommandOutcome::Captured {
                    allocation_id,
                    outcome: CaptureOutcome::AlreadyConfirmed,
                }));
                SmallVec::new()
            },
            AllocationStatus::Waiting => {
                // Consumed by promotion once a slot frees up
                state.last_outcome = Some(Ok(CommandOutcome::Captured {
                    allocation_id,
                    outcome: CaptureOutcome::AttachedToWaiting,
                }));
                SmallVec::new()
            },
            AllocationStatus::Pending | AllocationStatus::FailedNoSlot => {
                if state.ledger.try_reserve(&event_id) {
                    // Re-borrow after the ledger update
                    let payload = if let Some(record) = state.records.get_mut(&allocation_id) {
                        record.status = AllocationStatus::Confirmed;
                        if record.pass_payload.is_none() {
                            record.pass_payload = Some(record.gate_payload());
                        }
                        record.pass_payload.clone().unwrap_or_default()
                    } else {
                        String::new()
                    };

                    engine_metrics::record_allocation_confirmed();
                    tracing::info!(%allocation_id, %event_id, "payment captured; allocation confirmed");
                    state.last_outcome = Some(Ok(CommandOutcome::Captured {
                        allocation_id,
                        outcome: CaptureOutcome::Confirmed,
                    }));

                    smallvec![
                        Self::render_effect(env, allocation_id, payload),
                        Self::notify_effect(
                            env,
                            contact,
                            format!("Seat confirmed for event {event_id}"),
                            format!("Your seat is confirmed.\nAllocation ID: {allocation_id}"),
                        ),
                    ]
                } else {
                    if let Some(record) = state.records.get_mut(&allocation_id) {
                        record.status = AllocationStatus::FailedNoSlot;
                    }
                    tracing::info!(
                        %allocation_id,
                        %event_id,
                        "payment captured but no slot available; capture may be retried"
                    );
                    state.last_outcome = Some(Ok(CommandOutcome::Captured {
                        allocation_id,
                        outcome: CaptureOutcome::NoSlot,
                    }));
                    SmallVec::new()
                }
            },
            AllocationStatus::Cancelled => {
                state.last_outcome = Some(Err(Rejection::NotCapturable {
                    allocation_id,
                    status,
                }));
                SmallVec::new()
            },
        }
    }

    fn cancel(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        requester_id: RequesterId,
    ) -> Effects {
        let Some(record) = state.records.get_mut(&allocation_id) else {
            state.last_outcome = Some(Err(Rejection::UnknownAllocation(allocation_id)));
            return SmallVec::new();
        };
        if record.requester_id != requester_id {
            state.last_outcome = Some(Err(Rejection::NotOwner(allocation_id)));
            return SmallVec::new();
        }
        if record.status == AllocationStatus::Cancelled {
            // Idempotent: repeat cancels observe the same terminal state
            state.last_outcome = Some(Ok(CommandOutcome::Cancelled {
                allocation_id,
                released: false,
                already: true,
            }));
            return SmallVec::new();
        }
        if record.verified {
            state.last_outcome = Some(Err(Rejection::Verified(allocation_id)));
            return SmallVec::new();
        }

        let prior = record.status;
        let event_id = record.event_id;
        let contact = record.contact.clone();
        record.status = AllocationStatus::Cancelled;
        state.active_by_requester.remove(&(event_id, requester_id));

        engine_metrics::record_cancellation();
        tracing::info!(%allocation_id, %event_id, prior = %prior, "allocation cancelled");

        let mut effects: Effects = smallvec![Self::notify_effect(
            env,
            contact,
            format!("Allocation cancelled for event {event_id}"),
            format!(
                "Your allocation {allocation_id} has been cancelled.\nAny refund will be processed per policy."
            ),
        )];

        match prior {
            AllocationStatus::Confirmed => {
                // The slot goes back first; promotion then competes for it
                // with its own fresh reserve, so a missed promotion merely
                // leaves the slot available for the next request.
                state.ledger.release(&event_id);
                let (outcome, promote_effects) = Self::promote(state, env, event_id);
                tracing::debug!(%event_id, ?outcome, "promotion after cancellation");
                effects.extend(promote_effects);
            },
            AllocationStatus::Waiting => {
                match state.waitlist.remove_by_requester(&event_id, &requester_id) {
                    Ok(_) => state.waitlist.reindex(&event_id),
                    Err(error) => {
                        tracing::warn!(%allocation_id, %error, "waiting record had no queue entry");
                    },
                }
                engine_metrics::update_waitlist_depth(
                    &event_id.to_string(),
                    state.waitlist.waiting_count(&event_id),
                );
            },
            AllocationStatus::Pending
            | AllocationStatus::FailedNoSlot
            | AllocationStatus::Cancelled => {},
        }

        state.last_outcome = Some(Ok(CommandOutcome::Cancelled {
            allocation_id,
            released: prior == AllocationStatus::Confirmed,
            already: false,
        }));
        effects
    }

    /// One promotion attempt: pop the waitlist head and try to hand it the
    /// freed slot. Single-winner per release/reserve pair; always safe to
    /// retry because it performs its own fresh reserve.
    fn promote(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        event_id: EventId,
    ) -> (PromotionOutcome, Effects) {
        let Some(head) = state.waitlist.peek_head_waiting(&event_id) else {
            engine_metrics::record_promotion("queue_empty");
            return (PromotionOutcome::QueueEmpty, SmallVec::new());
        };

        if !state.ledger.try_reserve(&event_id) {
            engine_metrics::record_promotion("no_slot");
            tracing::debug!(%event_id, "nothing to promote into; slot already taken");
            return (PromotionOutcome::NoSlotFree, SmallVec::new());
        }

        let backing = state
            .records
            .get(&head.allocation_id)
            .map(|record| record.status);

        match backing {
            None | Some(AllocationStatus::Cancelled) => {
                // Dangling entry: undo the reserve, drop the entry, and keep
                // the queue dense. Distinguishable from a normal promotion
                // in both logs and metrics.
                tracing::warn!(
                    entry_id = %head.id,
                    allocation_id = %head.allocation_id,
                    %event_id,
                    "waitlist entry without usable record; repairing"
                );
                state.waitlist.remove(&event_id, &head.id);
                state.ledger.release(&event_id);
                state.waitlist.reindex(&event_id);
                engine_metrics::record_promotion("repaired");
                (
                    PromotionOutcome::RepairedDanglingEntry { entry_id: head.id },
                    SmallVec::new(),
                )
            },
            Some(AllocationStatus::Confirmed) => {
                // Duplicate trigger: the record needs no new slot, so the
                // unit taken above goes straight back.
                state.waitlist.mark_booked(&event_id, &head.id);
                state.ledger.release(&event_id);
                state.waitlist.reindex(&event_id);
                engine_metrics::record_promotion("idempotent");
                (
                    PromotionOutcome::AlreadyConfirmed {
                        allocation_id: head.allocation_id,
                    },
                    SmallVec::new(),
                )
            },
            Some(_) => {
                let (payload, contact) = match state.records.get_mut(&head.allocation_id) {
                    Some(record) => {
                        record.status = AllocationStatus::Confirmed;
                        if record.pass_payload.is_none() {
                            record.pass_payload = Some(record.gate_payload());
                        }
                        (
                            record.pass_payload.clone().unwrap_or_default(),
                            record.contact.clone(),
                        )
                    },
                    None => (String::new(), ContactAddress::new("")),
                };

                state.waitlist.mark_booked(&event_id, &head.id);
                state.waitlist.reindex(&event_id);
                engine_metrics::record_promotion("promoted");
                engine_metrics::update_waitlist_depth(
                    &event_id.to_string(),
                    state.waitlist.waiting_count(&event_id),
                );
                tracing::info!(
                    allocation_id = %head.allocation_id,
                    requester_id = %head.requester_id,
                    %event_id,
                    "waitlist head promoted"
                );

                let effects: Effects = smallvec![
                    Self::render_effect(env, head.allocation_id, payload),
                    Self::notify_effect(
                        env,
                        contact,
                        format!("Promoted from waitlist for event {event_id}"),
                        format!(
                            "A slot freed up and your allocation is now confirmed.\nAllocation ID: {}",
                            head.allocation_id
                        ),
                    ),
                ];
                (
                    PromotionOutcome::Promoted {
                        allocation_id: head.allocation_id,
                        requester_id: head.requester_id,
                    },
                    effects,
                )
            },
        }
    }

    fn verify_gate(
        state: &mut AllocationState,
        env: &AllocationEnvironment,
        allocation_id: AllocationId,
        presented: &str,
    ) -> Effects {
        let Some(record) = state.records.get_mut(&allocation_id) else {
            state.last_outcome = Some(Err(Rejection::UnknownAllocation(allocation_id)));
            return SmallVec::new();
        };

        if record.status != AllocationStatus::Confirmed {
            engine_metrics::record_gate_scan("rejected");
            state.last_outcome = Some(Err(Rejection::GateNotConfirmed(allocation_id)));
            return SmallVec::new();
        }

        // Backfill records that predate payload storage, then require an
        // exact match against the stored text.
        let expected = match &record.pass_payload {
            Some(payload) => payload.clone(),
            None => {
                let payload = record.gate_payload();
                record.pass_payload = Some(payload.clone());
                payload
            },
        };

        if presented != expected {
            engine_metrics::record_gate_scan("rejected");
            tracing::warn!(%allocation_id, "gate scan rejected: payload mismatch");
            state.last_outcome = Some(Err(Rejection::GatePayloadMismatch(allocation_id)));
            return SmallVec::new();
        }

        let now = env.clock.now();
        if record.verified {
            engine_metrics::record_gate_scan("duplicate");
            state.last_outcome = Some(Ok(CommandOutcome::Gate(GateDecision::AlreadyVerified {
                verified_at: record.verified_at.unwrap_or(now),
            })));
        } else {
            record.verified = true;
            record.verified_at = Some(now);
            engine_metrics::record_gate_scan("ok");
            tracing::info!(%allocation_id, "gate scan accepted");
            state.last_outcome = Some(Ok(CommandOutcome::Gate(GateDecision::VerifiedOk {
                verified_at: now,
            })));
        }
        SmallVec::new()
    }

    fn pass_rendered(
        state: &mut AllocationState,
        allocation_id: AllocationId,
        image: Vec<u8>,
    ) -> Effects {
        if let Some(record) = state.records.get_mut(&allocation_id) {
            if record.pass_image.is_none() {
                record.pass_image = Some(image);
            }
        } else {
            tracing::debug!(%allocation_id, "rendered pass for unknown record discarded");
        }
        SmallVec::new()
    }
}

impl Reducer for AllocationReducer {
    type State = AllocationState;
    type Action = AllocationAction;
    type Environment = AllocationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AllocationAction::OpenEvent {
                event_id,
                total_slots,
            } => Self::open_event(state, event_id, total_slots),

            AllocationAction::Admit {
                allocation_id,
                event_id,
                requester_id,
                contact,
                amount,
                order_ref,
            } => Self::admit(
                state,
                env,
                allocation_id,
                event_id,
                requester_id,
                contact,
                amount,
                order_ref,
            ),

            AllocationAction::Hold {
                allocation_id,
                event_id,
                requester_id,
                contact,
                amount,
                order_ref,
            } => Self::hold(
                state,
                env,
                allocation_id,
                event_id,
                requester_id,
                contact,
                amount,
                order_ref,
            ),

            AllocationAction::CapturePayment {
                allocation_id,
                payment_ref,
            } => Self::capture_payment(state, env, allocation_id, payment_ref),

            AllocationAction::Cancel {
                allocation_id,
                requester_id,
            } => Self::cancel(state, env, allocation_id, requester_id),

            AllocationAction::Promote { event_id } => {
                let (outcome, effects) = Self::promote(state, env, event_id);
                state.last_outcome = Some(Ok(CommandOutcome::Promotion(outcome)));
                effects
            },

            AllocationAction::VerifyGate {
                allocation_id,
                presented,
            } => Self::verify_gate(state, env, allocation_id, &presented),

            AllocationAction::PassRendered {
                allocation_id,
                image,
            } => Self::pass_rendered(state, allocation_id, image),
        }
    }
}
