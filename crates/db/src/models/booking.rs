//! Booking order and line item models.

use serde::Serialize;
use sqlx::FromRow;
use ticketry_core::booking::{BookingStatus, PaymentStatus};
use ticketry_core::types::{Cents, DbId, Timestamp};

/// A row from the `booking_orders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingOrder {
    pub id: DbId,
    pub user_id: DbId,
    pub event_id: DbId,
    pub slot_id: DbId,
    pub total_cents: Cents,
    pub booking_status: String,
    pub payment_status: String,
    pub payment_reference: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BookingOrder {
    pub fn status(&self) -> Result<BookingStatus, String> {
        BookingStatus::from_str(&self.booking_status)
    }

    pub fn payment(&self) -> Result<PaymentStatus, String> {
        PaymentStatus::from_str(&self.payment_status)
    }
}

pub struct CreateBookingOrder {
    pub user_id: DbId,
    pub event_id: DbId,
    pub slot_id: DbId,
    pub total_cents: Cents,
}

/// A row from the `booking_line_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingLineItem {
    pub id: DbId,
    pub order_id: DbId,
    pub seat_category_id: DbId,
    pub num_seats: i32,
    pub price_per_seat: Cents,
    pub total_cents: Cents,
    pub created_at: Timestamp,
}

pub struct CreateBookingLineItem {
    pub order_id: DbId,
    pub seat_category_id: DbId,
    pub num_seats: i32,
    pub price_per_seat: Cents,
}
