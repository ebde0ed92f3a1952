//! PayPal Orders v2 REST client.
//!
//! Authenticates with the client-credentials grant, creates `CAPTURE`
//! intent orders whose return/cancel URLs point back at the booking
//! callbacks, and captures them once the buyer has approved.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use ticketry_core::booking::format_cents;
use ticketry_core::types::{Cents, DbId};
use tokio::sync::Mutex;

use crate::{CaptureOutcome, PaymentError, PaymentGateway, ProviderOrder};

/// Outbound request timeout for every provider call.
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

const SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_URL: &str = "https://api-m.paypal.com";

/// Refresh the OAuth token this long before the provider says it expires.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalMode {
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_URL,
            Self::Live => LIVE_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub mode: PayPalMode,
    /// ISO 4217 currency code for every order.
    pub currency: String,
    /// Public base URL of this API; booking callbacks hang off it.
    pub callback_base_url: String,
    pub brand_name: String,
}

impl PayPalConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `PAYPAL_CLIENT_ID`     | (required)              |
    /// | `PAYPAL_CLIENT_SECRET` | (required)              |
    /// | `PAYPAL_MODE`          | `sandbox`               |
    /// | `PAYMENT_CURRENCY`     | `AUD`                   |
    /// | `API_BACKEND_URL`      | `http://localhost:3000` |
    /// | `PAYMENT_BRAND_NAME`   | `Ticketry`              |
    pub fn from_env() -> Result<Self, PaymentError> {
        let client_id = std::env::var("PAYPAL_CLIENT_ID")
            .map_err(|_| PaymentError::Config("PAYPAL_CLIENT_ID must be set".into()))?;
        let client_secret = std::env::var("PAYPAL_CLIENT_SECRET")
            .map_err(|_| PaymentError::Config("PAYPAL_CLIENT_SECRET must be set".into()))?;

        let mode = match std::env::var("PAYPAL_MODE")
            .unwrap_or_else(|_| "sandbox".into())
            .to_lowercase()
            .as_str()
        {
            "sandbox" => PayPalMode::Sandbox,
            "live" => PayPalMode::Live,
            other => {
                return Err(PaymentError::Config(format!(
                    "PAYPAL_MODE must be 'sandbox' or 'live', got '{other}'"
                )))
            }
        };

        Ok(Self {
            client_id,
            client_secret,
            mode,
            currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "AUD".into()),
            callback_base_url: std::env::var("API_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            brand_name: std::env::var("PAYMENT_BRAND_NAME").unwrap_or_else(|_| "Ticketry".into()),
        })
    }

    pub fn return_url(&self, order_id: DbId) -> String {
        format!("{}/api/v1/bookings/confirm?order_id={order_id}", self.callback_base_url)
    }

    pub fn cancel_url(&self, order_id: DbId) -> String {
        format!("{}/api/v1/bookings/cancel?order_id={order_id}", self.callback_base_url)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    reference_id: Option<String>,
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
}

/// Buyer approval link from a create-order response.
fn approval_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel == "approve" || l.rel == "payer-action")
        .map(|l| l.href.clone())
}

fn first_reference_id(units: &[PurchaseUnit]) -> Option<String> {
    units.iter().find_map(|u| u.reference_id.clone())
}

fn first_capture_id(units: &[PurchaseUnit]) -> Option<String> {
    units
        .iter()
        .filter_map(|u| u.payments.as_ref())
        .flat_map(|p| p.captures.iter())
        .map(|c| c.id.clone())
        .next()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// HTTP client for the PayPal REST API.
pub struct PayPalApi {
    client: reqwest::Client,
    config: PayPalConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalApi {
    pub fn new(config: PayPalConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()?;
        tracing::info!(mode = ?config.mode, "PayPal client initialised");
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.mode.base_url())
    }

    /// Return a cached OAuth token, fetching a new one when it is close to
    /// expiry.
    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let token: TokenResponse = Self::parse_response(response).await?;

        let lifetime = token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(token.access_token)
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PaymentError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PaymentGateway for PayPalApi {
    async fn create_order(
        &self,
        total: Cents,
        order_id: DbId,
    ) -> Result<Option<ProviderOrder>, PaymentError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order_id.to_string(),
                "amount": {
                    "currency_code": self.config.currency,
                    "value": format_cents(total),
                },
            }],
            "application_context": {
                "brand_name": self.config.brand_name,
                "payment_method_preference": "IMMEDIATE_PAYMENT_REQUIRED",
                "landing_page": "LOGIN",
                "user_action": "PAY_NOW",
                "return_url": self.config.return_url(order_id),
                "cancel_url": self.config.cancel_url(order_id),
            },
        });

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let order: OrderResponse = Self::parse_response(response).await?;
        Ok(approval_link(&order.links).map(|approval_url| ProviderOrder {
            id: order.id,
            approval_url,
        }))
    }

    async fn capture(&self, token: &str) -> Result<CaptureOutcome, PaymentError> {
        let access = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{token}/capture")))
            .bearer_auth(access)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let capture: CaptureResponse = Self::parse_response(response).await?;
        Ok(CaptureOutcome {
            capture_id: first_capture_id(&capture.purchase_units),
            reference_id: first_reference_id(&capture.purchase_units),
            status: capture.status,
        })
    }
}
