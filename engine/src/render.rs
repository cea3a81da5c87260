//! Gate-pass rendering collaborator.
//!
//! Turns the verification payload text into a scanner-presentable image
//! blob. Only the text payload participates in verification; the image is a
//! convenience artifact, rendered after confirmation on a background task,
//! and a render failure leaves the record confirmed without an image.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Render error
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// The renderer could not produce an image for this payload
    #[error("render failed: {reason}")]
    Failed {
        /// Failure reason
        reason: String,
    },
}

/// Pass renderer trait.
///
/// Returns `BoxFuture` rather than async fn to be dyn-compatible
/// (object-safe).
pub trait PassRenderer: Send + Sync {
    /// Render the payload text into an opaque image blob.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails; the caller keeps the payload and
    /// continues without an image.
    fn render(
        &self,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send>>;
}

/// In-process renderer producing a deterministic placeholder blob.
///
/// Stands in for a QR encoder: the blob embeds the payload bytes behind a
/// small header so tests can assert the right payload was rendered.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlinePassRenderer;

impl InlinePassRenderer {
    /// Magic prefix identifying blobs produced by this renderer
    pub const MAGIC: &'static [u8] = b"SLPASS1\n";

    /// Creates a new inline renderer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PassRenderer> {
        Arc::new(Self::new())
    }
}

impl PassRenderer for InlinePassRenderer {
    fn render(
        &self,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send>> {
        if payload.is_empty() {
            return Box::pin(async {
                Err(RenderError::Failed {
                    reason: "empty payload".to_string(),
                })
            });
        }

        let mut blob = Vec::with_capacity(Self::MAGIC.len() + payload.len());
        blob.extend_from_slice(Self::MAGIC);
        blob.extend_from_slice(payload.as_bytes());
        Box::pin(async move { Ok(blob) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_embeds_payload() {
        let renderer = InlinePassRenderer::new();
        let blob = renderer.render("Allocation ID: abc").await.unwrap();

        assert!(blob.starts_with(InlinePassRenderer::MAGIC));
        assert!(blob.ends_with(b"Allocation ID: abc"));
    }

    #[tokio::test]
    async fn test_render_rejects_empty_payload() {
        let renderer = InlinePassRenderer::new();
        assert!(renderer.render("").await.is_err());
    }
}
