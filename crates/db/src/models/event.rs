//! Event, slot, and seat category models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ticketry_core::booking::SeatCounters;
use ticketry_core::types::{Cents, DbId, Timestamp};

/// A row from the `events` table. `status` holds an `EventStatus` string.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: DbId,
    pub title: String,
    pub status: String,
    pub event_dates: Vec<NaiveDate>,
    pub location: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub status: String,
    pub event_dates: Vec<NaiveDate>,
    pub location: Option<String>,
}

/// A row from the `event_slots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventSlot {
    pub id: DbId,
    pub event_id: DbId,
    pub slot_date: NaiveDate,
    pub start_time: String,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventSlot {
    pub event_id: DbId,
    pub slot_date: NaiveDate,
    pub start_time: String,
    pub duration_minutes: i32,
}

/// A row from the `seat_categories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SeatCategory {
    pub id: DbId,
    pub slot_id: DbId,
    pub label: String,
    pub price_cents: Cents,
    pub total_tickets: i32,
    pub booked: i32,
    pub held: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SeatCategory {
    pub fn counters(&self) -> SeatCounters {
        SeatCounters {
            total: self.total_tickets,
            booked: self.booked,
            held: self.held,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSeatCategory {
    pub slot_id: DbId,
    pub label: String,
    pub price_cents: Cents,
    pub total_tickets: i32,
}
