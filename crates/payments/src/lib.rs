//! Payment provider integration.
//!
//! Booking code talks to a [`PaymentGateway`]; production wires in
//! [`paypal::PayPalApi`], tests substitute a fake.

pub mod paypal;

use async_trait::async_trait;
use ticketry_core::types::{Cents, DbId};

/// A provider order opened for one booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrder {
    /// Provider order id. The buyer returns with it as the capture token.
    pub id: String,
    /// Page the buyer must visit to approve the payment.
    pub approval_url: String,
}

/// Result of capturing an approved provider order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Provider-reported status, e.g. `"COMPLETED"`.
    pub status: String,
    /// Provider capture reference, when the capture produced one.
    pub capture_id: Option<String>,
    /// Booking id the provider order was opened for, as echoed back.
    pub reference_id: Option<String>,
}

/// Errors from the payment provider layer.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Payment provider error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Missing or invalid provider configuration.
    #[error("Payment configuration error: {0}")]
    Config(String),
}

/// Narrow contract the booking flow needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a provider order for `total`, tagged with `order_id`.
    /// `Ok(None)` means the provider answered without an approval link.
    async fn create_order(
        &self,
        total: Cents,
        order_id: DbId,
    ) -> Result<Option<ProviderOrder>, PaymentError>;

    /// Capture a buyer-approved provider order identified by `token`.
    async fn capture(&self, token: &str) -> Result<CaptureOutcome, PaymentError>;
}
