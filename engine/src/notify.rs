//! Notification sink collaborator.
//!
//! Fire-and-forget delivery of status changes to buyers. Delivery happens on
//! background tasks after a state transition is already durable, and a
//! failing sink is logged and swallowed - it can never roll back or block
//! the transition that triggered it.

use crate::types::ContactAddress;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Notification delivery error
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// The sink rejected or could not deliver the message
    #[error("delivery failed: {reason}")]
    DeliveryFailed {
        /// Failure reason
        reason: String,
    },
}

/// A notification handed to a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Recipient address
    pub to: ContactAddress,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

/// Notification sink trait.
///
/// Returns `BoxFuture` rather than async fn to be dyn-compatible
/// (object-safe).
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails; callers treat this as
    /// best-effort and must not propagate it into state transitions.
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

/// Sink that writes notifications to the tracing log.
///
/// The default sink for the demo binary; blank recipient addresses are
/// skipped silently.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotificationSink;

impl LogNotificationSink {
    /// Creates a new log sink
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn NotificationSink> {
        Arc::new(Self::new())
    }
}

impl NotificationSink for LogNotificationSink {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            if notification.to.is_empty() {
                return Ok(());
            }
            tracing::info!(
                to = %notification.to,
                subject = %notification.subject,
                body = %notification.body,
                "notification delivered"
            );
            Ok(())
        })
    }
}

/// Sink that drops every notification.
///
/// Used when delivery is disabled by configuration; transitions proceed
/// exactly as with a live sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardNotificationSink;

impl DiscardNotificationSink {
    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn NotificationSink> {
        Arc::new(Self)
    }
}

impl NotificationSink for DiscardNotificationSink {
    fn notify(
        &self,
        _notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// Sink that records every notification for test assertions.
///
/// Can be flipped into a failing mode to prove that delivery failures never
/// affect engine state.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
    fail_all: bool,
}

impl RecordingNotificationSink {
    /// Creates a recording sink that accepts every notification
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording sink that fails every delivery
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of everything delivered so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_all {
                return Err(NotifyError::DeliveryFailed {
                    reason: "sink configured to fail".to_string(),
                });
            }
            #[allow(clippy::unwrap_used)]
            self.sent.lock().unwrap().push(notification);
            Ok(())
        })
    }
}
