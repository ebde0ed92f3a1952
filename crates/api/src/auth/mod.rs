//! Authentication primitives.
//!
//! - [`keys`] -- RSA key pair on disk with periodic rotation.
//! - [`jwt`] -- RS256 token issuance, verification, and revocation.
//! - [`revocation`] -- revoked `jti` registry.
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`cookies`] -- the `access_token` cookie.

pub mod cookies;
pub mod jwt;
pub mod keys;
pub mod password;
pub mod revocation;
