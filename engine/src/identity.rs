//! Requester identity collaborator.
//!
//! Resolves a requester id to a profile (identity plus contact address).
//! Identity storage is someone else's problem; the engine only needs the
//! lookup contract, and admission fails fast when the requester is unknown.

use crate::types::{ContactAddress, RequesterId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A resolved requester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequesterProfile {
    /// Requester identity
    pub id: RequesterId,
    /// Where notifications for this requester are delivered
    pub contact: ContactAddress,
}

/// Directory lookup error
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// No profile exists for the requester
    #[error("requester not found: {0}")]
    NotFound(RequesterId),
}

/// Requester directory trait.
///
/// Returns `BoxFuture` rather than async fn to be dyn-compatible
/// (object-safe).
pub trait RequesterDirectory: Send + Sync {
    /// Resolve a requester id to its profile.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if no profile exists.
    fn resolve(
        &self,
        id: RequesterId,
    ) -> Pin<Box<dyn Future<Output = Result<RequesterProfile, DirectoryError>> + Send + '_>>;
}

/// In-process directory for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryRequesterDirectory {
    profiles: RwLock<HashMap<RequesterId, RequesterProfile>>,
}

impl InMemoryRequesterDirectory {
    /// Creates an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a requester, returning its id.
    pub async fn register(&self, contact: ContactAddress) -> RequesterId {
        let id = RequesterId::new();
        let profile = RequesterProfile { id, contact };
        self.profiles.write().await.insert(id, profile);
        id
    }
}

impl RequesterDirectory for InMemoryRequesterDirectory {
    fn resolve(
        &self,
        id: RequesterId,
    ) -> Pin<Box<dyn Future<Output = Result<RequesterProfile, DirectoryError>> + Send + '_>> {
        Box::pin(async move {
            self.profiles
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DirectoryError::NotFound(id))
        })
    }
}
