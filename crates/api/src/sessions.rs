//! Per-device login sessions.
//!
//! A session is created on login, or reused when the user already has an
//! active session for the same fingerprint and browser. Sessions only move
//! from active to terminated; a terminated row is never reactivated.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ticketry_core::device::{DeviceInfo, DeviceSignal};
use ticketry_core::session_policy::{sessions_to_evict, MAX_SESSIONS_PER_USER};
use ticketry_core::suspicious::{self, Alert, SUSPICIOUS_LOOKBACK_HOURS};
use ticketry_core::types::DbId;
use ticketry_db::models::device_session::{CreateDeviceSession, DeviceSession};
use ticketry_db::repositories::DeviceSessionRepo;
use ticketry_db::DbPool;

use crate::geo::{GeoLocator, Location, GEOLOCATION_TIMEOUT_SECS};

pub struct SessionManager {
    pool: DbPool,
    geo: Arc<dyn GeoLocator>,
    lookup_timeout: std::time::Duration,
}

impl SessionManager {
    pub fn new(pool: DbPool, geo: Arc<dyn GeoLocator>) -> Self {
        Self {
            pool,
            geo,
            lookup_timeout: std::time::Duration::from_secs(GEOLOCATION_TIMEOUT_SECS),
        }
    }

    /// Upper bound on the location lookup done while creating a session.
    pub fn with_lookup_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Create a session for `user_id`, or reuse the matching active one.
    ///
    /// When the user is at the session cap, the least recently used active
    /// sessions are deactivated first so the new row keeps the count at the
    /// cap.
    pub async fn create_session(
        &self,
        user_id: DbId,
        signal: &DeviceSignal,
        include_location: bool,
    ) -> Result<DeviceSession, sqlx::Error> {
        let info = DeviceInfo::from_signal(signal);

        if let Some(existing) =
            DeviceSessionRepo::find_reusable(&self.pool, user_id, &info.fingerprint, &info.browser_family)
                .await?
        {
            if let Some(session) =
                DeviceSessionRepo::touch(&self.pool, existing.id, Some(&info.ip_address)).await?
            {
                tracing::info!(user_id, session_id = session.id, "Reusing device session");
                return Ok(session);
            }
        }

        let location = if include_location {
            self.locate(&info.ip_address).await
        } else {
            None
        };

        let active = DeviceSessionRepo::list_active_ids_by_recency(&self.pool, user_id).await?;
        let evict = sessions_to_evict(&active, MAX_SESSIONS_PER_USER);
        if !evict.is_empty() {
            let evicted = DeviceSessionRepo::deactivate_many(&self.pool, evict).await?;
            tracing::info!(user_id, evicted, "Session cap reached, deactivated oldest sessions");
        }

        let input = new_session_row(user_id, &info, location.unwrap_or_default());
        let session = DeviceSessionRepo::create(&self.pool, &input).await?;
        tracing::info!(
            user_id,
            session_id = session.id,
            device = %session.device_name,
            "Created device session"
        );
        Ok(session)
    }

    /// Location lookup that gives up after `lookup_timeout`.
    async fn locate(&self, ip: &str) -> Option<Location> {
        match tokio::time::timeout(self.lookup_timeout, self.geo.locate(ip)).await {
            Ok(location) => location,
            Err(_) => {
                tracing::warn!(ip, "IP geolocation timed out, session stored without location");
                None
            }
        }
    }

    /// Terminate one session. `reason` is recorded in the log only.
    ///
    /// Returns `false` only when the session does not exist.
    pub async fn terminate_session(&self, session_id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let found = DeviceSessionRepo::terminate(&self.pool, session_id).await?;
        if found {
            tracing::info!(session_id, reason, "Terminated device session");
        }
        Ok(found)
    }

    /// Terminate every active session of `user_id` except `keep`.
    pub async fn terminate_all_sessions(
        &self,
        user_id: DbId,
        keep: Option<DbId>,
    ) -> Result<u64, sqlx::Error> {
        let count = DeviceSessionRepo::terminate_all_for_user(&self.pool, user_id, keep).await?;
        tracing::info!(user_id, count, ?keep, "Terminated device sessions");
        Ok(count)
    }

    /// Compare `current` with the user's recent and active sessions.
    ///
    /// Best effort: a lookup failure is logged and yields no alerts.
    pub async fn detect_suspicious_activity(
        &self,
        user_id: DbId,
        current: &DeviceSession,
    ) -> Vec<Alert> {
        let since = Utc::now() - Duration::hours(SUSPICIOUS_LOOKBACK_HOURS);
        let history = tokio::try_join!(
            DeviceSessionRepo::list_used_since(&self.pool, user_id, since),
            DeviceSessionRepo::list_for_user(&self.pool, user_id, true),
        );
        let (recent, active) = match history {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Suspicious activity check skipped");
                return Vec::new();
            }
        };

        let recent: Vec<_> = recent.iter().map(DeviceSession::snapshot).collect();
        let active: Vec<_> = active.iter().map(DeviceSession::snapshot).collect();
        let alerts = suspicious::detect(&current.snapshot(), &recent, &active);
        for alert in &alerts {
            tracing::warn!(
                user_id,
                session_id = current.id,
                kind = ?alert.kind,
                severity = ?alert.severity,
                message = %alert.message,
                "Suspicious login activity"
            );
        }
        alerts
    }

    /// Confirm `session_id` is active and owned by `user_id`, and bump its
    /// `last_used_at`. Returns `None` otherwise.
    pub async fn validate_session(
        &self,
        session_id: DbId,
        user_id: DbId,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        if DeviceSessionRepo::find_active_for_user(&self.pool, session_id, user_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }
        DeviceSessionRepo::touch(&self.pool, session_id, None).await
    }

    pub async fn list_sessions(
        &self,
        user_id: DbId,
        active_only: bool,
    ) -> Result<Vec<DeviceSession>, sqlx::Error> {
        DeviceSessionRepo::list_for_user(&self.pool, user_id, active_only).await
    }

    /// Most recently used active session of `user_id` from `ip`.
    pub async fn find_by_ip(
        &self,
        user_id: DbId,
        ip: &str,
    ) -> Result<Option<DeviceSession>, sqlx::Error> {
        DeviceSessionRepo::find_active_by_ip(&self.pool, user_id, ip).await
    }
}

fn new_session_row(user_id: DbId, info: &DeviceInfo, location: Location) -> CreateDeviceSession {
    CreateDeviceSession {
        user_id,
        device_fingerprint: info.fingerprint.clone(),
        device_name: info.display_name(),
        device_type: info.device_type.clone(),
        browser_family: info.browser_family.clone(),
        browser_version: info.browser_version.clone(),
        os_family: info.os_family.clone(),
        os_version: info.os_version.clone(),
        device_family: info.device_family.clone(),
        device_brand: info.device_brand.clone(),
        device_model: info.device_model.clone(),
        is_mobile: info.is_mobile,
        is_tablet: info.is_tablet,
        is_pc: info.is_pc,
        is_bot: info.is_bot,
        user_agent: info.user_agent.clone(),
        ip_address: info.ip_address.clone(),
        language: info.language.clone(),
        country: location.country,
        country_code: location.country_code,
        region: location.region,
        city: location.city,
        latitude: location.latitude,
        longitude: location.longitude,
        timezone: location.timezone,
        isp: location.isp,
    }
}
