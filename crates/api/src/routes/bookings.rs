//! Route definitions for the `/bookings` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bookings;
use crate::state::AppState;

/// Routes mounted at `/bookings`.
///
/// `confirm` and `cancel` are browser redirects from the payment provider
/// and carry no credentials.
///
/// ```text
/// POST /book        -> create
/// GET  /confirm     -> confirm
/// GET  /cancel      -> cancel
/// GET  /{id}        -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/book", post(bookings::create))
        .route("/confirm", get(bookings::confirm))
        .route("/cancel", get(bookings::cancel))
        .route("/{id}", get(bookings::get_by_id))
}
