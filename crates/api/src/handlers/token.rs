//! Handlers for the `/token` resource (refresh, revoke).

use axum::extract::State;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use ticketry_core::types::DbId;
use ticketry_db::repositories::UserRepo;

use crate::auth::cookies::set_access_cookie;
use crate::auth::jwt::{SessionBinding, TokenType};
use crate::error::{AppError, AppResult};
use crate::response::MessageResponse;
use crate::state::AppState;

/// Request body for `POST /token/refresh` and `POST /token/revoke`.
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub session_id: Option<DbId>,
}

/// POST /api/v1/token/refresh
///
/// Exchange a refresh token for a new access + refresh pair bound to the
/// same device session. The presented refresh token is revoked.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<RefreshTokenRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let claims = state.tokens.verify(&input.refresh_token).map_err(|e| {
        tracing::debug!(error = %e, "Refresh token rejected");
        AppError::unauthorized("Invalid or expired refresh token")
    })?;

    if claims.token_type != Some(TokenType::Refresh) {
        return Err(AppError::unauthorized("Token is not a refresh token"));
    }
    let user_id = claims
        .uid
        .ok_or_else(|| AppError::unauthorized("Refresh token has no user id"))?;

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User no longer exists".into()))?;
    if user.is_deleted {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    if let Some(session_id) = claims.sid {
        state
            .sessions
            .validate_session(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Session is no longer active"))?;
    }

    if let Err(e) = state.tokens.revoke_claims(&claims) {
        tracing::warn!(user_id, error = %e, "Old refresh token could not be revoked");
    }

    let pair = state
        .tokens
        .issue_pair(&SessionBinding {
            user_id,
            role_id: claims.rid,
            session_id: claims.sid,
            fingerprint: claims.df.clone(),
        })
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    UserRepo::touch_last_login(&state.pool, user_id).await?;
    tracing::info!(user_id, session_id = ?claims.sid, "Tokens refreshed");

    let expires_in = state.tokens.config().access_token_expiry_secs;
    let jar = set_access_cookie(jar, &pair.access_token, expires_in, state.config.cookie_secure);
    Ok((
        jar,
        Json(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in,
            session_id: claims.sid,
        }),
    ))
}

/// POST /api/v1/token/revoke
///
/// Revoke a refresh token and end its device session. Always returns 200;
/// a token that fails verification is logged and otherwise ignored.
pub async fn revoke(
    State(state): State<AppState>,
    Json(input): Json<RefreshTokenRequest>,
) -> Json<MessageResponse> {
    match state.tokens.verify(&input.refresh_token) {
        Ok(claims) => {
            if let (Some(session_id), Some(user_id)) = (claims.sid, claims.uid) {
                match state.sessions.validate_session(session_id, user_id).await {
                    Ok(Some(_)) => {
                        if let Err(e) = state
                            .sessions
                            .terminate_session(session_id, "token revoked")
                            .await
                        {
                            tracing::warn!(session_id, error = %e, "Session termination failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(session_id, error = %e, "Session lookup failed"),
                }
            }
            if let Err(e) = state.tokens.revoke_claims(&claims) {
                tracing::warn!(error = %e, "Token could not be revoked");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Revoke called with an invalid token"),
    }
    Json(MessageResponse::new("Token revoked"))
}
