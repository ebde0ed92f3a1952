//! Outbound customer notifications.
//!
//! [`email::EmailSender`] is the seam the API layer depends on; templates in
//! [`templates`] render the message bodies.

pub mod email;
pub mod templates;
