use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Token signing, lifetimes, and key rotation.
    pub jwt: JwtConfig,
    /// Set the `Secure` attribute on the access-token cookie.
    pub cookie_secure: bool,
    /// Frontend origin that payment callbacks redirect back to.
    pub frontend_url: String,
    /// IP geolocation base URL. `None` disables lookups.
    pub geolocation_url: Option<String>,
    /// Currency shown on confirmation emails.
    pub payment_currency: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `COOKIE_SECURE`        | `false`                    |
    /// | `FRONTEND_URL`         | `http://localhost:5173`    |
    /// | `GEOLOCATION_URL`      | `https://ipapi.co`         |
    /// | `PAYMENT_CURRENCY`     | `AUD`                      |
    ///
    /// See [`JwtConfig::from_env`] for the `JWT_*` variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let cookie_secure: bool = std::env::var("COOKIE_SECURE")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("COOKIE_SECURE must be 'true' or 'false'");

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();

        // An explicitly empty value turns lookups off.
        let geolocation_url = match std::env::var("GEOLOCATION_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url.trim_end_matches('/').to_string()),
            Err(_) => Some("https://ipapi.co".to_string()),
        };

        let payment_currency =
            std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "AUD".into());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            cookie_secure,
            frontend_url,
            geolocation_url,
            payment_currency,
        }
    }
}
