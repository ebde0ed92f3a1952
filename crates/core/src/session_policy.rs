//! Device session limits.

use crate::types::DbId;

/// Maximum concurrently active device sessions per user.
pub const MAX_SESSIONS_PER_USER: usize = 10;

/// Select which active sessions to deactivate before opening a new one.
///
/// `active_by_recency` must be ordered most recently used first. When the
/// user already holds `cap` or more active sessions, everything from index
/// `cap - 1` onward is returned so the new session brings the total back to
/// `cap`. Otherwise nothing is evicted.
pub fn sessions_to_evict(active_by_recency: &[DbId], cap: usize) -> &[DbId] {
    if cap == 0 || active_by_recency.len() < cap {
        return &[];
    }
    &active_by_recency[cap - 1..]
}
