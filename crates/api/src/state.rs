use std::sync::Arc;

use ticketry_notifications::email::EmailSender;
use ticketry_payments::PaymentGateway;

use crate::auth::jwt::TokenService;
use crate::config::ServerConfig;
use crate::sessions::SessionManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: ticketry_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Token issuance, verification, and revocation.
    pub tokens: Arc<TokenService>,
    /// Device session lifecycle.
    pub sessions: Arc<SessionManager>,
    /// Payment provider used by the booking flow.
    pub payments: Arc<dyn PaymentGateway>,
    /// Outbound email (confirmation messages).
    pub email: Arc<dyn EmailSender>,
}
