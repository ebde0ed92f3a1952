//! Suspicious-login heuristics.
//!
//! Detection is advisory: the login flow logs the resulting alerts and never
//! blocks on them.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::DbId;

/// Window of session history compared against a new login.
pub const SUSPICIOUS_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NewLocation,
    NewDevice,
    ConcurrentLocations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub severity: Severity,
}

/// The fields of a device session the heuristics look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: DbId,
    pub country: Option<String>,
    pub fingerprint: Option<String>,
    pub device_name: String,
}

/// Compare `current` against the user's other sessions.
///
/// `recent` holds sessions used within [`SUSPICIOUS_LOOKBACK_HOURS`];
/// `active` holds every currently active session. `current` itself may appear
/// in either slice and is ignored for the "seen before" comparisons.
pub fn detect(
    current: &SessionSnapshot,
    recent: &[SessionSnapshot],
    active: &[SessionSnapshot],
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let history: Vec<&SessionSnapshot> = recent.iter().filter(|s| s.id != current.id).collect();

    if let Some(country) = non_empty(&current.country) {
        let seen: BTreeSet<&str> = history
            .iter()
            .filter_map(|s| non_empty(&s.country))
            .collect();
        if !seen.is_empty() && !seen.contains(country) {
            alerts.push(Alert {
                kind: AlertKind::NewLocation,
                message: format!("Login from new country: {country}"),
                severity: Severity::Medium,
            });
        }
    }

    if let Some(fingerprint) = non_empty(&current.fingerprint) {
        let seen: BTreeSet<&str> = history
            .iter()
            .filter_map(|s| non_empty(&s.fingerprint))
            .collect();
        if !seen.is_empty() && !seen.contains(fingerprint) {
            alerts.push(Alert {
                kind: AlertKind::NewDevice,
                message: format!("Login from new device: {}", current.device_name),
                severity: Severity::Low,
            });
        }
    }

    if active.len() > 1 {
        let countries: BTreeSet<&str> = active.iter().filter_map(|s| non_empty(&s.country)).collect();
        if countries.len() > 1 {
            alerts.push(Alert {
                kind: AlertKind::ConcurrentLocations,
                message: format!(
                    "Concurrent sessions from multiple countries: {}",
                    countries.into_iter().collect::<Vec<_>>().join(", ")
                ),
                severity: Severity::High,
            });
        }
    }

    alerts
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
