//! User entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ticketry_core::login_policy::LoginStatus;
use ticketry_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<DbId>,
    pub email_verified: bool,
    pub is_deleted: bool,
    pub login_status: i16,
    pub failure_login_attempts: i32,
    pub successful_login_count: i32,
    pub last_login: Option<Timestamp>,
    pub days_180_flag: bool,
    pub days_180_timestamp: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Decoded `login_status`. The column is CHECK-constrained, so an
    /// out-of-range value means the row was written outside the app.
    pub fn status(&self) -> Result<LoginStatus, String> {
        LoginStatus::from_db(self.login_status)
    }
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub email: String,
    pub role_id: Option<DbId>,
    pub login_status: i16,
    pub last_login: Option<Timestamp>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role_id: user.role_id,
            login_status: user.login_status,
            last_login: user.last_login,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<DbId>,
    pub email_verified: bool,
    pub login_status: LoginStatus,
    pub days_180_flag: bool,
}
