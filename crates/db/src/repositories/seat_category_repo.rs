//! Repository for the `seat_categories` table.
//!
//! Counter mutations (`hold`, `release`, `commit`) take a connection so they
//! run inside the booking transaction that owns the order row.

use sqlx::{PgConnection, PgPool};
use ticketry_core::types::DbId;

use crate::models::event::{CreateSeatCategory, SeatCategory};

const COLUMNS: &str = "id, slot_id, label, price_cents, total_tickets, booked, held, \
                        is_active, created_at, updated_at";

pub struct SeatCategoryRepo;

impl SeatCategoryRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateSeatCategory,
    ) -> Result<SeatCategory, sqlx::Error> {
        let query = format!(
            "INSERT INTO seat_categories (slot_id, label, price_cents, total_tickets)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SeatCategory>(&query)
            .bind(input.slot_id)
            .bind(&input.label)
            .bind(input.price_cents)
            .bind(input.total_tickets)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SeatCategory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM seat_categories WHERE id = $1");
        sqlx::query_as::<_, SeatCategory>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock a category row for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<SeatCategory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM seat_categories WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, SeatCategory>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Add `seats` to `held` if that many are still available.
    /// Returns `false` when the category would be oversold.
    pub async fn hold(conn: &mut PgConnection, id: DbId, seats: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE seat_categories SET held = held + $2
             WHERE id = $1 AND total_tickets - (booked + held) >= $2",
        )
        .bind(id)
        .bind(seats)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Give back a provisional reservation.
    pub async fn release(conn: &mut PgConnection, id: DbId, seats: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE seat_categories SET held = GREATEST(held - $2, 0) WHERE id = $1")
            .bind(id)
            .bind(seats)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Move a provisional reservation from `held` to `booked`.
    pub async fn commit(conn: &mut PgConnection, id: DbId, seats: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE seat_categories SET
                held = GREATEST(held - $2, 0),
                booked = booked + $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(seats)
        .execute(conn)
        .await?;
        Ok(())
    }
}
