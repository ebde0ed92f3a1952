//! Repository for the `event_slots` table.

use sqlx::PgPool;
use ticketry_core::types::DbId;

use crate::models::event::{CreateEventSlot, EventSlot};

const COLUMNS: &str =
    "id, event_id, slot_date, start_time, duration_minutes, is_active, created_at, updated_at";

pub struct SlotRepo;

impl SlotRepo {
    pub async fn create(pool: &PgPool, input: &CreateEventSlot) -> Result<EventSlot, sqlx::Error> {
        let query = format!(
            "INSERT INTO event_slots (event_id, slot_date, start_time, duration_minutes)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventSlot>(&query)
            .bind(input.event_id)
            .bind(input.slot_date)
            .bind(&input.start_time)
            .bind(input.duration_minutes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<EventSlot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM event_slots WHERE id = $1");
        sqlx::query_as::<_, EventSlot>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Enable or disable a slot for booking.
    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE event_slots SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
