//! Repository for the `users` table.

use sqlx::PgPool;
use ticketry_core::login_policy::LoginStatus;
use ticketry_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, password_hash, role_id, email_verified, is_deleted, \
                        login_status, failure_login_attempts, successful_login_count, \
                        last_login, days_180_flag, days_180_timestamp, created_at, updated_at";

/// Provides account queries and the login bookkeeping updates.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row. The email is stored
    /// lowercased.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users
                (email, password_hash, role_id, email_verified, login_status, days_180_flag)
             VALUES (LOWER($1), $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.role_id)
            .bind(input.email_verified)
            .bind(input.login_status.as_db())
            .bind(input.days_180_flag)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lift an expired lock: back to active with a zero failure counter.
    pub async fn unlock(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET login_status = $2, failure_login_attempts = 0 WHERE id = $1",
        )
        .bind(id)
        .bind(LoginStatus::Active.as_db())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count a failed password check and apply the lock once the counter
    /// reaches `lock_threshold`, all in one statement so concurrent
    /// failures cannot overwrite each other.
    ///
    /// The lock stamps `last_login` as the start of the lockout window; an
    /// account that is already locked keeps its original stamp. Returns the
    /// updated row.
    pub async fn record_failed_login(
        pool: &PgPool,
        id: DbId,
        lock_threshold: i32,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                failure_login_attempts = failure_login_attempts + 1,
                login_status = CASE
                    WHEN failure_login_attempts + 1 >= $2 THEN $3
                    ELSE login_status
                END,
                last_login = CASE
                    WHEN failure_login_attempts + 1 >= $2 AND login_status <> $3 THEN NOW()
                    ELSE last_login
                END
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(lock_threshold)
            .bind(LoginStatus::Locked.as_db())
            .fetch_one(pool)
            .await
    }

    /// Record a successful login: reset the failure counter, bump
    /// `successful_login_count`, stamp `last_login`, and store `status`.
    ///
    /// Returns the updated row.
    pub async fn record_successful_login(
        pool: &PgPool,
        id: DbId,
        status: LoginStatus,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                failure_login_attempts = 0,
                successful_login_count = successful_login_count + 1,
                last_login = NOW(),
                login_status = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(status.as_db())
            .fetch_one(pool)
            .await
    }

    /// Stamp the start of the 180-day password window.
    pub async fn stamp_password_window(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET days_180_timestamp = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Touch `last_login` without altering counters (token refresh).
    pub async fn touch_last_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace the password hash and mark the account active. Restarts the
    /// 180-day window when the policy is enabled for this user.
    ///
    /// Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                password_hash = $2,
                login_status = $3,
                failure_login_attempts = 0,
                days_180_timestamp = CASE WHEN days_180_flag THEN NOW() ELSE days_180_timestamp END
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(LoginStatus::Active.as_db())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a user. Returns `true` if the row was updated.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_deleted = true WHERE id = $1 AND is_deleted = false")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
