//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus the create DTOs used by its repository.

pub mod booking;
pub mod device_session;
pub mod event;
pub mod user;
