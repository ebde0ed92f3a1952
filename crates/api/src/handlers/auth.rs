//! Handlers for the `/auth` resource (login, logout, change-password).

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use ticketry_core::error::CoreError;
use ticketry_core::login_policy::{
    check_new_password, evaluate_lock, evaluate_password_expiry, failure_outcome, FailureOutcome,
    LockDecision, LoginStatus, PasswordChangeError, PasswordExpiry, MAX_LOGIN_ATTEMPTS_BEFORE_LOCKOUT,
};
use ticketry_core::types::DbId;
use ticketry_db::models::user::{User, UserResponse};
use ticketry_db::repositories::UserRepo;
use validator::Validate;

use crate::auth::cookies::{clear_access_cookie, set_access_cookie};
use crate::auth::jwt::SessionBinding;
use crate::auth::password::{hash_password, verify_password};
use crate::client_info::ClientInfo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::request_token;
use crate::response::MessageResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request body for `POST /auth/change-password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    pub new_password: String,
}

/// Successful login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: DbId,
    pub user: UserResponse,
    /// The 180-day rule expired the password; the client must force a change.
    pub password_expired: bool,
}

/// Returned instead of tokens while the account still has its initial password.
#[derive(Debug, Serialize)]
pub struct InitialLoginResponse {
    pub initial_login: bool,
    pub requires_password_change: bool,
    pub user_id: DbId,
    pub email: String,
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Each gate short-circuits: unknown
/// email, unverified email, deleted account, active lock, wrong password,
/// initial password. On success a device session is created or reused and
/// an access + refresh token pair is returned, with the access token also
/// set as a cookie and mirrored in the `Authorization` header.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> AppResult<Response> {
    input.validate()?;
    let now = Utc::now();

    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account exists for this email".into()))?;

    if !user.email_verified {
        return Err(AppError::forbidden("Email address has not been verified"));
    }
    if user.is_deleted {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    let mut status = login_status(&user)?;
    match evaluate_lock(status, user.last_login, now) {
        LockDecision::Open => {}
        LockDecision::StillLocked => {
            tracing::info!(user_id = user.id, "Login refused, account locked");
            return Err(account_locked());
        }
        LockDecision::Unlock => {
            UserRepo::unlock(&state.pool, user.id).await?;
            tracing::info!(user_id = user.id, "Lockout window elapsed, account unlocked");
            status = LoginStatus::Active;
        }
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        let failed =
            UserRepo::record_failed_login(&state.pool, user.id, MAX_LOGIN_ATTEMPTS_BEFORE_LOCKOUT)
                .await?;
        return Err(match failure_outcome(failed.failure_login_attempts) {
            FailureOutcome::Lock { attempts } => {
                tracing::warn!(user_id = user.id, attempts, "Account locked after failed logins");
                account_locked()
            }
            FailureOutcome::Retry { remaining, .. } => AppError::unauthorized(format!(
                "Invalid email or password. {remaining} attempt(s) remaining before the account is locked"
            )),
        });
    }

    if status == LoginStatus::Initial {
        tracing::info!(user_id = user.id, "Initial login, password change required");
        return Ok(Json(InitialLoginResponse {
            initial_login: true,
            requires_password_change: true,
            user_id: user.id,
            email: user.email.clone(),
            message: "Password change required before first login",
        })
        .into_response());
    }

    let next_status = match evaluate_password_expiry(user.days_180_flag, user.days_180_timestamp, now) {
        PasswordExpiry::Expired => LoginStatus::PasswordExpired,
        PasswordExpiry::StampNow => {
            UserRepo::stamp_password_window(&state.pool, user.id).await?;
            status
        }
        PasswordExpiry::Valid => status,
    };
    let user = UserRepo::record_successful_login(&state.pool, user.id, next_status).await?;

    let session = state.sessions.create_session(user.id, &client.0, true).await?;
    state
        .sessions
        .detect_suspicious_activity(user.id, &session)
        .await;

    let pair = state
        .tokens
        .issue_pair(&SessionBinding {
            user_id: user.id,
            role_id: user.role_id,
            session_id: Some(session.id),
            fingerprint: Some(session.device_fingerprint.clone()),
        })
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    tracing::info!(user_id = user.id, session_id = session.id, "User logged in");

    let expires_in = state.tokens.config().access_token_expiry_secs;
    let jar = set_access_cookie(jar, &pair.access_token, expires_in, state.config.cookie_secure);
    let bearer = format!("Bearer {}", pair.access_token);
    let body = AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
        expires_in,
        session_id: session.id,
        password_expired: next_status == LoginStatus::PasswordExpired,
        user: UserResponse::from(&user),
    };
    Ok((jar, [(AUTHORIZATION, bearer)], Json(body)).into_response())
}

/// POST /api/v1/auth/logout
///
/// Clear the access-token cookie, terminate the token's device session
/// (falling back to any active session from the caller's address), and
/// revoke the token. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = request_token(&headers) {
        end_token_session(&state, &token, client.ip()).await;
    }
    (clear_access_cookie(jar), Json(MessageResponse::new("Logged out")))
}

/// POST /api/v1/auth/change-password
///
/// Replace the password of an account that is in its initial state or whose
/// password expired. Failed attempts here do not count towards the lockout.
pub async fn change_password(
    State(state): State<AppState>,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;

    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account exists for this email".into()))?;
    if user.is_deleted {
        return Err(AppError::forbidden("Account is deactivated"));
    }
    if evaluate_lock(login_status(&user)?, user.last_login, Utc::now()) == LockDecision::StillLocked {
        return Err(account_locked());
    }

    let current_valid = verify_password(&input.current_password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_valid {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    check_new_password(&input.current_password, &input.new_password).map_err(|e| match e {
        PasswordChangeError::TooShort => CoreError::Validation(e.to_string()),
        PasswordChangeError::SameAsCurrent => CoreError::Conflict(e.to_string()),
    })?;

    let hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &hash).await?;
    tracing::info!(user_id = user.id, "Password changed");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn login_status(user: &User) -> AppResult<LoginStatus> {
    user.status().map_err(AppError::InternalError)
}

fn account_locked() -> AppError {
    AppError::Core(CoreError::Locked(
        "Account is locked after repeated failed logins. Try again in 24 hours.".into(),
    ))
}

/// Best-effort teardown behind logout. Every failure is logged and dropped.
async fn end_token_session(state: &AppState, token: &str, ip: &str) {
    let claims = match state.tokens.decode_ignoring_expiry(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Logout token could not be decoded");
            return;
        }
    };

    let session_id = match (claims.sid, claims.uid) {
        (Some(sid), _) => Some(sid),
        (None, Some(uid)) => match state.sessions.find_by_ip(uid, ip).await {
            Ok(session) => session.map(|s| s.id),
            Err(e) => {
                tracing::warn!(user_id = uid, error = %e, "Logout session lookup failed");
                None
            }
        },
        (None, None) => None,
    };

    if let Some(session_id) = session_id {
        if let Err(e) = state.sessions.terminate_session(session_id, "logout").await {
            tracing::warn!(session_id, error = %e, "Logout session termination failed");
        }
    }

    if let Err(e) = state.tokens.revoke_claims(&claims) {
        tracing::warn!(error = %e, "Logout token could not be revoked");
    }
    tracing::info!(user_id = ?claims.uid, session_id = ?session_id, "User logged out");
}
