//! Booking state, line validation, and money helpers.
//!
//! A booking order moves `PROCESSING -> {APPROVED, FAILED, CANCELLED}`. While
//! processing, every line item keeps its quantity in the seat category's
//! `held` counter. Exactly one settlement runs per order: approval moves the
//! quantity from `held` to `booked`, failure and cancellation give it back.
//! The counters themselves change in SQL; this module only reads them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Cents;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on seats requested for one seat category in one order.
pub const MAX_SEATS_PER_LINE: i32 = 20;

/// Provider capture status that approves an order.
pub const CAPTURE_COMPLETED: &str = "COMPLETED";

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Processing,
    Approved,
    Failed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Approved => "APPROVED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "PROCESSING" => Ok(Self::Processing),
            "APPROVED" => Ok(Self::Approved),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("Invalid booking status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("Invalid payment status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Active,
    Inactive,
    Pending,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Pending => "PENDING",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("Invalid event status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Terminal transition applied to a processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Approve,
    Fail,
    Cancel,
}

impl Settlement {
    /// Map a provider capture status onto a settlement.
    pub fn from_capture_status(status: &str) -> Self {
        if status == CAPTURE_COMPLETED {
            Self::Approve
        } else {
            Self::Fail
        }
    }

    pub fn booking_status(self) -> BookingStatus {
        match self {
            Self::Approve => BookingStatus::Approved,
            Self::Fail => BookingStatus::Failed,
            Self::Cancel => BookingStatus::Cancelled,
        }
    }

    pub fn payment_status(self) -> PaymentStatus {
        match self {
            Self::Approve => PaymentStatus::Completed,
            Self::Fail => PaymentStatus::Failed,
            Self::Cancel => PaymentStatus::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Seat counters
// ---------------------------------------------------------------------------

/// Counters of one seat category. `booked + held <= total` holds between
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCounters {
    pub total: i32,
    pub booked: i32,
    pub held: i32,
}

impl SeatCounters {
    pub fn available(&self) -> i32 {
        self.total - (self.booked + self.held)
    }
}

// ---------------------------------------------------------------------------
// Line validation
// ---------------------------------------------------------------------------

/// One requested seat-category line after decoding the client payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub num_seats: i32,
    pub price_per_seat: Cents,
}

impl LineRequest {
    pub fn total(&self) -> Cents {
        self.price_per_seat * Cents::from(self.num_seats)
    }
}

/// Shape checks that do not need any stored state.
pub fn validate_line_shape(line: &LineRequest) -> Result<(), CoreError> {
    if line.num_seats <= 0 {
        return Err(CoreError::Validation(
            "Number of seats must be greater than 0".to_string(),
        ));
    }
    if line.num_seats > MAX_SEATS_PER_LINE {
        return Err(CoreError::Validation(format!(
            "Cannot book more than {MAX_SEATS_PER_LINE} seats at once"
        )));
    }
    if line.price_per_seat < 0 {
        return Err(CoreError::Validation(
            "Price per seat cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Check a line against the stored seat category, in guard order:
/// duplicate booking, availability, then price.
///
/// Nothing is mutated; the caller holds seats only after this passes.
pub fn check_line(
    category_label: &str,
    line: &LineRequest,
    counters: &SeatCounters,
    stored_price: Cents,
    has_active_booking: bool,
) -> Result<(), CoreError> {
    if has_active_booking {
        return Err(CoreError::Conflict(format!(
            "You already have an active booking for seat category '{category_label}'"
        )));
    }
    if line.num_seats > counters.available() {
        return Err(CoreError::Validation(format!(
            "Only {} seats available for '{category_label}', requested {}",
            counters.available().max(0),
            line.num_seats
        )));
    }
    if line.price_per_seat != stored_price {
        return Err(CoreError::Validation(format!(
            "Price mismatch for '{category_label}': expected {}, got {}",
            format_cents(stored_price),
            format_cents(line.price_per_seat)
        )));
    }
    Ok(())
}

pub fn order_total(lines: &[LineRequest]) -> Cents {
    lines.iter().map(LineRequest::total).sum()
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Convert a decimal currency amount to integer cents, rounding half away
/// from zero.
pub fn to_cents(amount: f64) -> Result<Cents, CoreError> {
    if !amount.is_finite() {
        return Err(CoreError::Validation("Amount must be a finite number".to_string()));
    }
    Ok((amount * 100.0).round() as Cents)
}

/// Render cents as a two-decimal string, e.g. `1050 -> "10.50"`.
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
