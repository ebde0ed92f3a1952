//! Handlers for the `/sessions` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use ticketry_core::error::CoreError;
use ticketry_core::types::DbId;
use ticketry_db::models::device_session::DeviceSession;
use ticketry_db::repositories::DeviceSessionRepo;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    /// Include terminated sessions when `false` (default `true`).
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TerminateAllQuery {
    /// Keep the caller's own session (default `true`).
    pub keep_current: Option<bool>,
}

/// A session as shown to its owner.
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: DeviceSession,
    /// This is the session the request was made from.
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
pub struct TerminatedCount {
    pub terminated: u64,
}

/// GET /api/v1/sessions
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<DataResponse<Vec<SessionView>>>> {
    let sessions = state
        .sessions
        .list_sessions(auth.user_id, query.active_only.unwrap_or(true))
        .await?;
    let data = sessions
        .into_iter()
        .map(|session| SessionView {
            is_current: Some(session.id) == auth.session_id,
            session,
        })
        .collect();
    Ok(Json(DataResponse { data }))
}

/// DELETE /api/v1/sessions/{id}
///
/// Terminate one of the caller's own sessions.
pub async fn terminate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<DbId>,
) -> AppResult<Json<MessageResponse>> {
    let session = DeviceSessionRepo::find_by_id(&state.pool, session_id)
        .await?
        .filter(|s| s.user_id == auth.user_id)
        .ok_or(CoreError::NotFound {
            entity: "DeviceSession",
            id: session_id,
        })?;

    state
        .sessions
        .terminate_session(session.id, "terminated by user")
        .await?;
    Ok(Json(MessageResponse::new("Session terminated")))
}

/// DELETE /api/v1/sessions?keep_current=true
///
/// Terminate all of the caller's sessions, by default except the current one.
pub async fn terminate_all(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TerminateAllQuery>,
) -> AppResult<Json<DataResponse<TerminatedCount>>> {
    let keep = if query.keep_current.unwrap_or(true) {
        auth.session_id
    } else {
        None
    };
    let terminated = state
        .sessions
        .terminate_all_sessions(auth.user_id, keep)
        .await?;
    Ok(Json(DataResponse {
        data: TerminatedCount { terminated },
    }))
}
