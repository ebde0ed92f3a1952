//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated principal behind an access token.

pub mod auth;
