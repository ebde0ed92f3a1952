//! Best-effort IP geolocation for device sessions.
//!
//! Lookups never fail the caller: every error path returns `None` and logs
//! at `warn`.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outbound timeout for a single lookup.
pub const GEOLOCATION_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: &str) -> Option<Location>;
}

/// Locator used when lookups are disabled.
pub struct DisabledLocator;

#[async_trait]
impl GeoLocator for DisabledLocator {
    async fn locate(&self, _ip: &str) -> Option<Location> {
        None
    }
}

// ---------------------------------------------------------------------------
// ipapi.co client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: Option<bool>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    org: Option<String>,
}

impl IpApiResponse {
    fn into_location(self) -> Option<Location> {
        if self.error.unwrap_or(false) {
            return None;
        }
        Some(Location {
            city: self.city,
            region: self.region,
            country: self.country_name,
            country_code: self.country_code,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone,
            isp: self.org,
        })
    }
}

/// HTTP client for `https://ipapi.co/{ip}/json/`.
pub struct IpApiLocator {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GEOLOCATION_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, ip: &str) -> Result<Option<Location>, reqwest::Error> {
        let response = self
            .client
            .get(format!("{}/{ip}/json/", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let body: IpApiResponse = response.json().await?;
        Ok(body.into_location())
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn locate(&self, ip: &str) -> Option<Location> {
        if !is_public_ip(ip) {
            return None;
        }
        match self.fetch(ip).await {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(ip, error = %e, "Geolocation lookup failed");
                None
            }
        }
    }
}

/// Whether `ip` is a routable address worth looking up.
pub fn is_public_ip(ip: &str) -> bool {
    let Ok(addr) = ip.trim().parse::<IpAddr>() else {
        return false;
    };
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
