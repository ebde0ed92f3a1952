//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use ticketry_core::types::DbId;
use ticketry_db::repositories::UserRepo;

use crate::auth::cookies::access_token_from;
use crate::auth::jwt::TokenType;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user behind the request's access token.
///
/// The token is read from `Authorization: Bearer <token>`, falling back to
/// the `access_token` cookie. When the token is bound to a device session,
/// that session must still be active and its `last_used_at` is bumped.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, session_id = ?user.session_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// Role id for admin accounts.
    pub role_id: Option<DbId>,
    /// Device session the token is bound to.
    pub session_id: Option<DbId>,
    /// The raw access token, for handlers that revoke it.
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Missing access token"))?;

        let claims = state.tokens.verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::unauthorized("Invalid or expired token")
        })?;

        if claims.token_type == Some(TokenType::Refresh) {
            return Err(AppError::unauthorized(
                "Refresh tokens cannot be used to authenticate requests",
            ));
        }
        let user_id = claims
            .uid
            .ok_or_else(|| AppError::unauthorized("Token has no user id"))?;

        if let Some(session_id) = claims.sid {
            state
                .sessions
                .validate_session(session_id, user_id)
                .await?
                .ok_or_else(|| AppError::unauthorized("Session is no longer active"))?;
        }

        let user = UserRepo::find_by_id(&state.pool, user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;
        if user.is_deleted {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        Ok(AuthUser {
            user_id,
            role_id: claims.rid,
            session_id: claims.sid,
            token,
        })
    }
}

/// Token from the `Authorization` header, else from the cookie.
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| access_token_from(&CookieJar::from_headers(headers)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
