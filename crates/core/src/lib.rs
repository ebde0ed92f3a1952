//! Ticketry domain logic.
//!
//! Pure functions and types shared by the database and HTTP layers. Nothing
//! in this crate performs I/O; callers load rows and pass them in.

pub mod booking;
pub mod device;
pub mod error;
pub mod login_policy;
pub mod session_policy;
pub mod suspicious;
pub mod types;
