//! Ticketry API server library.
//!
//! Exposes the core building blocks (config, state, auth, sessions, error
//! handling, routes) so integration tests and the binary entrypoint can both
//! access them.

pub mod auth;
pub mod client_info;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod state;
