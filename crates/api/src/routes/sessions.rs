//! Route definitions for the `/sessions` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// All routes require authentication (enforced by the `AuthUser` extractor).
///
/// ```text
/// GET    /        -> list
/// DELETE /        -> terminate_all
/// DELETE /{id}    -> terminate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list).delete(sessions::terminate_all))
        .route("/{id}", delete(sessions::terminate))
}
