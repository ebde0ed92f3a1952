//! Request handlers.
//!
//! Each submodule holds the async handlers for one resource. Handlers call
//! the repositories in `ticketry_db` or the services on [`crate::state::AppState`]
//! and map errors via [`crate::error::AppError`].

pub mod auth;
pub mod bookings;
pub mod sessions;
pub mod token;
