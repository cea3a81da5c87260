//! Payment gateway collaborator.
//!
//! The engine creates a payment order *before* attempting any slot work, so
//! both confirmed and waiting buyers carry a live payment obligation and
//! promotion never needs a new payment step. The gateway is consumed as an
//! opaque service; the mock implementation here stands in for processors
//! like Stripe or Razorpay in development and tests.

use crate::types::{Money, OrderRef};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payment gateway error
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The gateway declined to create the order
    #[error("order declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },
    /// Gateway timeout
    #[error("gateway timeout")]
    Timeout,
    /// Other error
    #[error("payment error: {message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// An order created at the gateway.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    /// Gateway-assigned order reference
    pub order_ref: OrderRef,
    /// Amount the order was opened for
    pub amount: Money,
}

/// Payment gateway trait.
///
/// Abstraction over external payment processors. Returns `BoxFuture` rather
/// than async fn to be dyn-compatible (object-safe).
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order for the given amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects or cannot reach the order.
    fn create_order(
        &self,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentOrder>> + Send>>;

    /// Refund an order, partially if an amount is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the refund fails at the gateway.
    fn refund(
        &self,
        order_ref: &OrderRef,
        amount: Option<Money>,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send>>;
}

/// Mock payment gateway for development and tests.
///
/// Succeeds by default; `declining` builds one that rejects every order,
/// which is how the all-or-nothing admission path is exercised.
#[derive(Clone, Debug)]
pub struct MockPaymentGateway {
    latency: Duration,
    decline_all: bool,
}

impl MockPaymentGateway {
    /// Creates a gateway that approves every order
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::from_millis(0),
            decline_all: false,
        }
    }

    /// Creates a gateway that declines every order
    #[must_use]
    pub const fn declining() -> Self {
        Self {
            latency: Duration::from_millis(0),
            decline_all: true,
        }
    }

    /// Simulate network latency on every call
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order(
        &self,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentOrder>> + Send>> {
        let latency = self.latency;
        let decline_all = self.decline_all;
        Box::pin(async move {
            tokio::time::sleep(latency).await;

            if decline_all {
                return Err(GatewayError::Declined {
                    reason: "declined by mock gateway".to_string(),
                });
            }

            let order_ref = OrderRef::new(format!("mock_order_{}", uuid::Uuid::new_v4()));

            tracing::info!(
                order_ref = %order_ref,
                amount_cents = amount.cents(),
                "Mock payment order created"
            );

            Ok(PaymentOrder { order_ref, amount })
        })
    }

    fn refund(
        &self,
        order_ref: &OrderRef,
        amount: Option<Money>,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send>> {
        let latency = self.latency;
        let order_ref = order_ref.clone();
        Box::pin(async move {
            tokio::time::sleep(latency).await;

            let refund_id = format!("mock_refund_{}", uuid::Uuid::new_v4());

            tracing::info!(
                order_ref = %order_ref,
                amount_cents = amount.map(|a| a.cents()),
                refund_id = %refund_id,
                "Mock refund processed"
            );

            Ok(refund_id)
        })
    }
}
