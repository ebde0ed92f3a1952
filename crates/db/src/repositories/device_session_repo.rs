//! Repository for the `device_sessions` table.

use sqlx::PgPool;
use ticketry_core::types::{DbId, Timestamp};

use crate::models::device_session::{CreateDeviceSession, DeviceSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, device_fingerprint, device_name, device_type, \
                        browser_family, browser_version, os_family, os_version, \
                        device_family, device_brand, device_model, \
                        is_mobile, is_tablet, is_pc, is_bot, user_agent, ip_address, language, \
                        country, country_code, region, city, latitude, longitude, timezone, isp, \
                        is_active, logged_in_at, last_used_at, logged_out_at, created_at, updated_at";

/// Provides persistence for per-device login sessions.
pub struct DeviceSessionRepo;

impl DeviceSessionRepo {
    /// Insert a new active session, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDeviceSession,
    ) -> Result<DeviceSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO device_sessions
                (user_id, device_fingerprint, device_name, device_type,
                 browser_family, browser_version, os_family, os_version,
                 device_family, device_brand, device_model,
                 is_mobile, is_tablet, is_pc, is_bot, user_agent, ip_address, language,
                 country, country_code, region, city, latitude, longitude, timezone, isp)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                     $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(input.user_id)
            .bind(&input.device_fingerprint)
            .bind(&input.device_name)
            .bind(&input.device_type)
            .bind(&input.browser_family)
            .bind(&input.browser_version)
            .bind(&input.os_family)
            .bind(&input.os_version)
            .bind(&input.device_family)
            .bind(&input.device_brand)
            .bind(&input.device_model)
            .bind(input.is_mobile)
            .bind(input.is_tablet)
            .bind(input.is_pc)
            .bind(input.is_bot)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(&input.language)
            .bind(&input.country)
            .bind(&input.country_code)
            .bind(&input.region)
            .bind(&input.city)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(&input.timezone)
            .bind(&input.isp)
            .fetch_one(pool)
            .await
    }

    /// Find a session by ID regardless of state.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DeviceSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM device_sessions WHERE id = $1");
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active session owned by `user_id`.
    pub async fn find_active_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_sessions
             WHERE id = $1 AND user_id = $2 AND is_active = true"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the most recently used active session for the same device.
    pub async fn find_reusable(
        pool: &PgPool,
        user_id: DbId,
        fingerprint: &str,
        browser_family: &str,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_sessions
             WHERE user_id = $1 AND device_fingerprint = $2 AND browser_family = $3
               AND is_active = true
             ORDER BY last_used_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(user_id)
            .bind(fingerprint)
            .bind(browser_family)
            .fetch_optional(pool)
            .await
    }

    /// Find an active session for `user_id` that last came from `ip_address`.
    pub async fn find_active_by_ip(
        pool: &PgPool,
        user_id: DbId,
        ip_address: &str,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_sessions
             WHERE user_id = $1 AND ip_address = $2 AND is_active = true
             ORDER BY last_used_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(user_id)
            .bind(ip_address)
            .fetch_optional(pool)
            .await
    }

    /// Bump `last_used_at`, optionally recording a new client address.
    /// Returns the updated row, or `None` if the session is not active.
    pub async fn touch(
        pool: &PgPool,
        id: DbId,
        ip_address: Option<&str>,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        let query = format!(
            "UPDATE device_sessions SET
                last_used_at = NOW(),
                ip_address = COALESCE($2, ip_address)
             WHERE id = $1 AND is_active = true
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(id)
            .bind(ip_address)
            .fetch_optional(pool)
            .await
    }

    /// IDs of the user's active sessions, most recently used first.
    pub async fn list_active_ids_by_recency(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM device_sessions
             WHERE user_id = $1 AND is_active = true
             ORDER BY last_used_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// List a user's sessions, most recently used first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        active_only: bool,
    ) -> Result<Vec<DeviceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_sessions
             WHERE user_id = $1 AND ($2 = false OR is_active = true)
             ORDER BY last_used_at DESC, id DESC"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(user_id)
            .bind(active_only)
            .fetch_all(pool)
            .await
    }

    /// Sessions of any state used at or after `since`.
    pub async fn list_used_since(
        pool: &PgPool,
        user_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<DeviceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_sessions
             WHERE user_id = $1 AND last_used_at >= $2
             ORDER BY last_used_at DESC"
        );
        sqlx::query_as::<_, DeviceSession>(&query)
            .bind(user_id)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// Deactivate the listed sessions. Already inactive rows are untouched.
    /// Returns the count of deactivated sessions.
    pub async fn deactivate_many(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE device_sessions SET is_active = false, logged_out_at = NOW()
             WHERE id = ANY($1) AND is_active = true",
        )
        .bind(ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Terminate one session.
    ///
    /// Idempotent: an already inactive session keeps its original
    /// `logged_out_at`. Returns `false` only when no such session exists.
    pub async fn terminate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE device_sessions SET is_active = false, logged_out_at = NOW()
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM device_sessions WHERE id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(exists.0)
    }

    /// Terminate every active session of a user except `keep`.
    /// Returns the count of terminated sessions.
    pub async fn terminate_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        keep: Option<DbId>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE device_sessions SET is_active = false, logged_out_at = NOW()
             WHERE user_id = $1 AND is_active = true
               AND ($2::BIGINT IS NULL OR id <> $2)",
        )
        .bind(user_id)
        .bind(keep)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
