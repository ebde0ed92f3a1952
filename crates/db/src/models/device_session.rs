//! Device session model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use ticketry_core::suspicious::SessionSnapshot;
use ticketry_core::types::{DbId, Timestamp};

/// A row from the `device_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceSession {
    pub id: DbId,
    pub user_id: DbId,
    pub device_fingerprint: String,
    pub device_name: String,
    pub device_type: String,
    pub browser_family: String,
    pub browser_version: Option<String>,
    pub os_family: String,
    pub os_version: Option<String>,
    pub device_family: String,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub is_bot: bool,
    #[serde(skip_serializing)]
    pub user_agent: String,
    pub ip_address: String,
    pub language: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub is_active: bool,
    pub logged_in_at: Timestamp,
    pub last_used_at: Timestamp,
    pub logged_out_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DeviceSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            country: self.country.clone(),
            fingerprint: Some(self.device_fingerprint.clone()),
            device_name: self.device_name.clone(),
        }
    }
}

/// DTO for inserting a new device session.
#[derive(Debug, Clone, Default)]
pub struct CreateDeviceSession {
    pub user_id: DbId,
    pub device_fingerprint: String,
    pub device_name: String,
    pub device_type: String,
    pub browser_family: String,
    pub browser_version: Option<String>,
    pub os_family: String,
    pub os_version: Option<String>,
    pub device_family: String,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub is_bot: bool,
    pub user_agent: String,
    pub ip_address: String,
    pub language: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
}
