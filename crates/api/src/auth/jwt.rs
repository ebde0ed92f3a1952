//! RS256 access/refresh token issuance, verification, and revocation.
//!
//! Tokens carry the session binding (`uid`, `rid`, `sid`, `df`,
//! `token_type`) plus the registered claims stamped at issue time. Both
//! token types are verified the same way; callers check `token_type`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use ticketry_core::types::DbId;
use uuid::Uuid;

use crate::auth::keys::KeyManager;
use crate::auth::revocation::RevocationStore;

/// Clock skew tolerated on `exp` and `iat`, in seconds.
const LEEWAY_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for token signing, validation, and key rotation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Directory holding the RSA key pair and key id.
    pub key_dir: PathBuf,
    /// Regenerate the key pair once it is this many days old.
    pub key_refresh_days: u64,
    pub issuer: String,
    pub audience: String,
    /// Access token (and cookie) lifetime in seconds.
    pub access_token_expiry_secs: i64,
    /// Refresh token lifetime in days.
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in seconds.
const DEFAULT_ACCESS_EXPIRY_SECS: i64 = 3600;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;
/// Default key rotation interval in days.
const DEFAULT_KEY_REFRESH_DAYS: u64 = 30;

impl JwtConfig {
    /// Load token configuration from environment variables.
    ///
    /// | Env Var                   | Default            |
    /// |---------------------------|--------------------|
    /// | `JWT_KEY_DIR`             | `keys`             |
    /// | `JWT_KEY_REFRESH_DAYS`    | `30`               |
    /// | `JWT_ISSUER`              | `ticketry`         |
    /// | `JWT_AUDIENCE`            | `ticketry-clients` |
    /// | `JWT_ACCESS_EXPIRY_SECS`  | `3600`             |
    /// | `JWT_REFRESH_EXPIRY_DAYS` | `7`                |
    ///
    /// # Panics
    ///
    /// Panics if a numeric variable does not parse.
    pub fn from_env() -> Self {
        let key_dir = PathBuf::from(std::env::var("JWT_KEY_DIR").unwrap_or_else(|_| "keys".into()));

        let key_refresh_days: u64 = std::env::var("JWT_KEY_REFRESH_DAYS")
            .unwrap_or_else(|_| DEFAULT_KEY_REFRESH_DAYS.to_string())
            .parse()
            .expect("JWT_KEY_REFRESH_DAYS must be a valid u64");

        let access_token_expiry_secs: i64 = std::env::var("JWT_ACCESS_EXPIRY_SECS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_SECS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_SECS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            key_dir,
            key_refresh_days,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "ticketry".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "ticketry-clients".into()),
            access_token_expiry_secs,
            refresh_token_expiry_days,
        }
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload. Every field is optional on the wire so that missing claims
/// surface as [`TokenError::MissingClaim`] rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<DbId>,
    /// Role id (admin accounts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<DbId>,
    /// Device session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<DbId>,
    /// Device fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub df: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Any additional caller-supplied claims, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The identity a token pair is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub user_id: DbId,
    pub role_id: Option<DbId>,
    pub session_id: Option<DbId>,
    pub fingerprint: Option<String>,
}

impl SessionBinding {
    fn claims(&self, token_type: TokenType) -> Claims {
        Claims {
            uid: Some(self.user_id),
            rid: self.role_id,
            sid: self.session_id,
            df: self.fingerprint.clone(),
            token_type: Some(token_type),
            ..Claims::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token input: {0}")]
    InvalidInput(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token issued-at time is invalid")]
    InvalidIssuedAt,

    #[error("Token algorithm is not supported")]
    UnsupportedAlgorithm,

    #[error("Token is missing required claim '{0}'")]
    MissingClaim(String),

    /// Issuer or audience does not match this service.
    #[error("Token claim is invalid: {0}")]
    InvalidClaim(String),

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token is malformed: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnsupportedAlgorithm
            }
            ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
            ErrorKind::InvalidIssuer => TokenError::InvalidClaim("iss".into()),
            ErrorKind::InvalidAudience => TokenError::InvalidClaim("aud".into()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenService
// ---------------------------------------------------------------------------

/// Issues and verifies tokens with the active key pair and consults the
/// revocation registry.
pub struct TokenService {
    keys: Arc<KeyManager>,
    config: JwtConfig,
    revoked: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(keys: Arc<KeyManager>, config: JwtConfig, revoked: Arc<dyn RevocationStore>) -> Self {
        Self {
            keys,
            config,
            revoked,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.config.access_token_expiry_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.config.refresh_token_expiry_days)
    }

    /// Unexpired entries still held by the revocation registry.
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    /// Sign `claims` after stamping `exp`, `iat`, `jti`, `iss`, `aud`, and
    /// `kid`. The signed token is decoded again with the public key before
    /// it is returned.
    pub fn issue(&self, mut claims: Claims, expires_in: Duration) -> Result<String, TokenError> {
        if claims.uid.is_none() {
            return Err(TokenError::InvalidInput("claims must include uid".into()));
        }

        let now = Utc::now().timestamp();
        claims.iat = Some(now);
        claims.exp = Some(now + expires_in.num_seconds());
        claims.jti = Some(Uuid::new_v4().to_string());
        claims.iss = Some(self.config.issuer.clone());
        claims.aud = Some(self.config.audience.clone());
        claims.kid = Some(self.keys.key_id().to_string());

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.keys.key_id().to_string());

        let token = encode(&header, &claims, self.keys.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        self.decode(&token, false)
            .map_err(|e| TokenError::Signing(format!("issued token failed verification: {e}")))?;

        Ok(token)
    }

    /// Issue an access and a refresh token for the same session.
    pub fn issue_pair(&self, binding: &SessionBinding) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(binding.claims(TokenType::Access), self.access_ttl())?,
            refresh_token: self.issue(binding.claims(TokenType::Refresh), self.refresh_ttl())?,
        })
    }

    /// Full verification: signature, `exp`, `iat`, issuer, audience, and
    /// the revocation registry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token, true)?;
        let jti = claims
            .jti
            .as_deref()
            .ok_or_else(|| TokenError::MissingClaim("jti".into()))?;
        if self.revoked.is_revoked(jti) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Verify everything except expiry and revocation. Used to recover the
    /// session binding from a token the client is discarding.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, false)
    }

    /// Add the token's `jti` to the revocation registry. Already-expired
    /// tokens are accepted.
    pub fn revoke(&self, token: &str) -> Result<(), TokenError> {
        let claims = self.decode_ignoring_expiry(token)?;
        self.revoke_claims(&claims)
    }

    pub fn revoke_claims(&self, claims: &Claims) -> Result<(), TokenError> {
        match (claims.jti.as_deref(), claims.exp) {
            (Some(jti), Some(exp)) => {
                self.revoked.revoke(jti, exp);
                tracing::debug!(jti, "Token revoked");
                Ok(())
            }
            _ => Err(TokenError::InvalidInput(
                "token must carry jti and exp to be revoked".into(),
            )),
        }
    }

    fn validation(&self, check_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS as u64;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = check_exp;
        if check_exp {
            validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        } else {
            validation.set_required_spec_claims(&["iss", "aud"]);
        }
        validation
    }

    fn decode(&self, token: &str, check_exp: bool) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, self.keys.decoding_key(), &self.validation(check_exp))?;
        let claims = data.claims;

        match claims.iat {
            None => return Err(TokenError::MissingClaim("iat".into())),
            Some(iat) if iat > Utc::now().timestamp() + LEEWAY_SECS => {
                return Err(TokenError::InvalidIssuedAt)
            }
            Some(_) => {}
        }
        Ok(claims)
    }
}
