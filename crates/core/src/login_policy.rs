//! Account login policy: lockout, failed-attempt accounting, and the
//! 180-day password rotation rule.
//!
//! The HTTP layer loads the user row, asks these functions what to do, and
//! persists the outcome. Keeping the decisions here lets them be tested
//! without a database.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Consecutive failed password checks that lock the account.
pub const MAX_LOGIN_ATTEMPTS_BEFORE_LOCKOUT: i32 = 3;

/// How long a locked account stays locked, measured from `last_login`.
pub const ACCOUNT_LOCKOUT_DURATION_HOURS: i64 = 24;

/// Days after which a flagged password is considered expired.
pub const PASSWORD_EXPIRED_DAYS: i64 = 180;

/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// LoginStatus
// ---------------------------------------------------------------------------

/// Persisted `login_status` column (`SMALLINT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    /// Account created, password never changed by its owner.
    Initial,
    Active,
    Locked,
    PasswordExpired,
}

impl LoginStatus {
    /// Convert from the database value.
    pub fn from_db(value: i16) -> Result<Self, String> {
        match value {
            -1 => Ok(Self::Initial),
            0 => Ok(Self::Active),
            1 => Ok(Self::Locked),
            2 => Ok(Self::PasswordExpired),
            other => Err(format!("Invalid login_status value {other}")),
        }
    }

    /// Convert to the database value.
    pub fn as_db(self) -> i16 {
        match self {
            Self::Initial => -1,
            Self::Active => 0,
            Self::Locked => 1,
            Self::PasswordExpired => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Lock gate
// ---------------------------------------------------------------------------

/// Result of the lock gate for an account about to attempt a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    /// Account is not locked; continue.
    Open,
    /// Account is locked and the lockout window has not elapsed.
    StillLocked,
    /// Lockout window elapsed: reset to active with a zero failure counter.
    Unlock,
}

/// Decide whether a locked account may proceed.
///
/// The lock timestamp is `last_login`, which is stamped when the lock is
/// applied. A locked account with no timestamp is unlocked.
pub fn evaluate_lock(
    status: LoginStatus,
    last_login: Option<Timestamp>,
    now: Timestamp,
) -> LockDecision {
    if status != LoginStatus::Locked {
        return LockDecision::Open;
    }
    match last_login {
        Some(locked_at) if now - locked_at < Duration::hours(ACCOUNT_LOCKOUT_DURATION_HOURS) => {
            LockDecision::StillLocked
        }
        _ => LockDecision::Unlock,
    }
}

// ---------------------------------------------------------------------------
// Failed attempts
// ---------------------------------------------------------------------------

/// What happens after a wrong password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The counter reached the threshold; lock the account now.
    Lock { attempts: i32 },
    /// Still below the threshold.
    Retry { attempts: i32, remaining: i32 },
}

/// Classify a failed password check from the counter value stored after
/// the increment.
pub fn failure_outcome(attempts: i32) -> FailureOutcome {
    if attempts >= MAX_LOGIN_ATTEMPTS_BEFORE_LOCKOUT {
        FailureOutcome::Lock { attempts }
    } else {
        FailureOutcome::Retry {
            attempts,
            remaining: MAX_LOGIN_ATTEMPTS_BEFORE_LOCKOUT - attempts,
        }
    }
}

// ---------------------------------------------------------------------------
// Password expiry
// ---------------------------------------------------------------------------

/// Outcome of the 180-day password rotation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordExpiry {
    /// Policy disabled or window not yet elapsed.
    Valid,
    /// Policy just enabled with no prior stamp: stamp `now`, not expired.
    StampNow,
    /// Window elapsed; mark `login_status = PasswordExpired`.
    Expired,
}

/// Apply the 180-day rule to the `days_180_flag` / `days_180_timestamp` pair.
pub fn evaluate_password_expiry(
    flag: bool,
    stamped_at: Option<Timestamp>,
    now: Timestamp,
) -> PasswordExpiry {
    match (flag, stamped_at) {
        (false, _) => PasswordExpiry::Valid,
        (true, None) => PasswordExpiry::StampNow,
        (true, Some(stamp)) if (now - stamp).num_days() >= PASSWORD_EXPIRED_DAYS => {
            PasswordExpiry::Expired
        }
        (true, Some(_)) => PasswordExpiry::Valid,
    }
}

/// Validate a replacement password against the current one.
///
/// Returns a human-readable reason on rejection. Reuse of the current
/// password is reported separately so callers can map it to a conflict.
pub fn check_new_password(current: &str, new: &str) -> Result<(), PasswordChangeError> {
    if new.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordChangeError::TooShort);
    }
    if current == new {
        return Err(PasswordChangeError::SameAsCurrent);
    }
    Ok(())
}

/// Reasons a password change is refused before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordChangeError {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("New password must differ from the current password")]
    SameAsCurrent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(hours: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    #[test]
    fn login_status_db_mapping() {
        for status in [
            LoginStatus::Initial,
            LoginStatus::Active,
            LoginStatus::Locked,
            LoginStatus::PasswordExpired,
        ] {
            assert_eq!(LoginStatus::from_db(status.as_db()), Ok(status));
        }
        assert_eq!(LoginStatus::Initial.as_db(), -1);
        assert!(LoginStatus::from_db(7).is_err());
    }

    #[test]
    fn unlocked_account_is_open() {
        assert_eq!(
            evaluate_lock(LoginStatus::Active, Some(at(0)), at(1)),
            LockDecision::Open
        );
        assert_eq!(
            evaluate_lock(LoginStatus::Initial, None, at(1)),
            LockDecision::Open
        );
    }

    #[test]
    fn lock_holds_for_24_hours() {
        assert_eq!(
            evaluate_lock(LoginStatus::Locked, Some(at(0)), at(23)),
            LockDecision::StillLocked
        );
        assert_eq!(
            evaluate_lock(LoginStatus::Locked, Some(at(0)), at(24)),
            LockDecision::Unlock
        );
    }

    #[test]
    fn lock_without_timestamp_unlocks() {
        assert_eq!(
            evaluate_lock(LoginStatus::Locked, None, at(0)),
            LockDecision::Unlock
        );
    }

    #[test]
    fn third_failure_locks() {
        assert_eq!(
            failure_outcome(1),
            FailureOutcome::Retry { attempts: 1, remaining: 2 }
        );
        assert_eq!(
            failure_outcome(2),
            FailureOutcome::Retry { attempts: 2, remaining: 1 }
        );
        assert_eq!(failure_outcome(3), FailureOutcome::Lock { attempts: 3 });
        assert_eq!(failure_outcome(6), FailureOutcome::Lock { attempts: 6 });
    }

    #[test]
    fn password_expiry_disabled_flag() {
        assert_eq!(
            evaluate_password_expiry(false, Some(at(-24 * 400)), at(0)),
            PasswordExpiry::Valid
        );
    }

    #[test]
    fn password_expiry_first_encounter_stamps() {
        assert_eq!(
            evaluate_password_expiry(true, None, at(0)),
            PasswordExpiry::StampNow
        );
    }

    #[test]
    fn password_expiry_boundary() {
        let now = at(0);
        assert_eq!(
            evaluate_password_expiry(true, Some(now - Duration::days(179)), now),
            PasswordExpiry::Valid
        );
        assert_eq!(
            evaluate_password_expiry(true, Some(now - Duration::days(180)), now),
            PasswordExpiry::Expired
        );
    }

    #[test]
    fn new_password_rules() {
        assert_eq!(
            check_new_password("old-password", "short"),
            Err(PasswordChangeError::TooShort)
        );
        assert_eq!(
            check_new_password("same-password", "same-password"),
            Err(PasswordChangeError::SameAsCurrent)
        );
        assert!(check_new_password("old-password", "brand-new-password").is_ok());
    }
}
