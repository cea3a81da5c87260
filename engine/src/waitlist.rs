//! Waitlist queue: an ordered, per-event FIFO of pending requesters.
//!
//! Positions among WAITING entries form a dense `1..N` sequence whenever the
//! engine is not mid-transition. Every structural change (promotion or
//! removal) is followed by a `reindex` pass, which is the source of truth
//! for positions; FIFO order is defined by `created_at` with the insertion
//! sequence as the tie-break, not by wall-clock call order.

use crate::types::{AllocationId, EntryId, EntryStatus, EventId, QueueEntry, RequesterId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Waitlist lookup error
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaitlistError {
    /// No waiting entry exists for the requester on this event
    #[error("no waiting entry for requester {requester_id} on event {event_id}")]
    NotFound {
        /// Event whose waitlist was searched
        event_id: EventId,
        /// Requester with no entry
        requester_id: RequesterId,
    },
}

/// Per-event FIFO waitlists.
#[derive(Clone, Debug, Default)]
pub struct WaitlistQueue {
    entries: HashMap<EventId, Vec<QueueEntry>>,
    next_sequence: u64,
}

impl WaitlistQueue {
    /// Creates an empty waitlist
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waiting entry at position `waiting_count + 1`.
    ///
    /// Returns the created entry.
    pub fn enqueue(
        &mut self,
        event_id: EventId,
        allocation_id: AllocationId,
        requester_id: RequesterId,
        created_at: DateTime<Utc>,
    ) -> QueueEntry {
        let position = self.waiting_count(&event_id) as u32 + 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let entry = QueueEntry {
            id: EntryId::new(),
            event_id,
            allocation_id,
            requester_id,
            position,
            status: EntryStatus::Waiting,
            created_at,
            sequence,
        };
        self.entries.entry(event_id).or_default().push(entry.clone());
        entry
    }

    /// The WAITING entry with the smallest position, ties broken by the
    /// earliest `created_at` and then insertion sequence.
    #[must_use]
    pub fn peek_head_waiting(&self, event_id: &EventId) -> Option<QueueEntry> {
        self.entries
            .get(event_id)?
            .iter()
            .filter(|entry| entry.status == EntryStatus::Waiting)
            .min_by_key(|entry| (entry.position, entry.created_at, entry.sequence))
            .cloned()
    }

    /// Recompute a dense `1..N` position sequence over the WAITING entries,
    /// ordered by `created_at` ascending (insertion sequence on ties).
    ///
    /// Invoked after every structural change to restore the position
    /// invariant.
    pub fn reindex(&mut self, event_id: &EventId) {
        let Some(entries) = self.entries.get_mut(event_id) else {
            return;
        };
        let mut waiting: Vec<&mut QueueEntry> = entries
            .iter_mut()
            .filter(|entry| entry.status == EntryStatus::Waiting)
            .collect();
        waiting.sort_by_key(|entry| (entry.created_at, entry.sequence));
        for (index, entry) in waiting.into_iter().enumerate() {
            entry.position = index as u32 + 1;
        }
    }

    /// Remove the WAITING entry belonging to a requester.
    ///
    /// The caller must subsequently call [`WaitlistQueue::reindex`].
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::NotFound`] if the requester has no waiting
    /// entry on this event.
    pub fn remove_by_requester(
        &mut self,
        event_id: &EventId,
        requester_id: &RequesterId,
    ) -> Result<QueueEntry, WaitlistError> {
        let entries = self
            .entries
            .get_mut(event_id)
            .ok_or(WaitlistError::NotFound {
                event_id: *event_id,
                requester_id: *requester_id,
            })?;
        let index = entries
            .iter()
            .position(|entry| {
                entry.status == EntryStatus::Waiting && entry.requester_id == *requester_id
            })
            .ok_or(WaitlistError::NotFound {
                event_id: *event_id,
                requester_id: *requester_id,
            })?;
        Ok(entries.remove(index))
    }

    /// Remove an entry outright by id (repair path for dangling entries).
    pub fn remove(&mut self, event_id: &EventId, entry_id: &EntryId) -> Option<QueueEntry> {
        let entries = self.entries.get_mut(event_id)?;
        let index = entries.iter().position(|entry| entry.id == *entry_id)?;
        Some(entries.remove(index))
    }

    /// Transition an entry to BOOKED with the terminal position sentinel 0.
    ///
    /// Returns whether the entry existed.
    pub fn mark_booked(&mut self, event_id: &EventId, entry_id: &EntryId) -> bool {
        let Some(entries) = self.entries.get_mut(event_id) else {
            return false;
        };
        let Some(entry) = entries.iter_mut().find(|entry| entry.id == *entry_id) else {
            return false;
        };
        entry.status = EntryStatus::Booked;
        entry.position = 0;
        true
    }

    /// The WAITING entry belonging to a requester, if any
    #[must_use]
    pub fn find_waiting(
        &self,
        event_id: &EventId,
        requester_id: &RequesterId,
    ) -> Option<&QueueEntry> {
        self.entries.get(event_id).and_then(|entries| {
            entries.iter().find(|entry| {
                entry.status == EntryStatus::Waiting && entry.requester_id == *requester_id
            })
        })
    }

    /// A requester's current waiting position, 0 if they are not waiting
    #[must_use]
    pub fn position_of(&self, event_id: &EventId, requester_id: &RequesterId) -> u32 {
        self.find_waiting(event_id, requester_id)
            .map_or(0, |entry| entry.position)
    }

    /// Number of WAITING entries for an event
    #[must_use]
    pub fn waiting_count(&self, event_id: &EventId) -> usize {
        self.entries.get(event_id).map_or(0, |entries| {
            entries
                .iter()
                .filter(|entry| entry.status == EntryStatus::Waiting)
                .count()
        })
    }

    /// WAITING entries for an event, ordered by position
    #[must_use]
    pub fn waiting(&self, event_id: &EventId) -> Vec<QueueEntry> {
        let mut waiting: Vec<QueueEntry> = self
            .entries
            .get(event_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.status == EntryStatus::Waiting)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        waiting.sort_by_key(|entry| entry.position);
        waiting
    }
}
