pub mod auth;
pub mod bookings;
pub mod health;
pub mod sessions;
pub mod token;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/login                                      login (public)
/// /auth/logout                                     logout (public, best effort)
/// /auth/change-password                            change initial or expired password
///
/// /token/refresh                                   rotate a refresh token (public)
/// /token/revoke                                    revoke a refresh token (public)
///
/// /sessions                                        list, terminate all (requires auth)
/// /sessions/{id}                                   terminate one (requires auth)
///
/// /bookings/book                                   create (requires auth)
/// /bookings/confirm                                payment provider return URL
/// /bookings/cancel                                 payment provider cancel URL
/// /bookings/{id}                                   get own order (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/token", token::router())
        .nest("/sessions", sessions::router())
        .nest("/bookings", bookings::router())
}
