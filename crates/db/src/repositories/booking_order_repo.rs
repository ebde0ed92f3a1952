//! Repository for `booking_orders` and their `booking_line_items`.

use sqlx::{PgConnection, PgPool};
use ticketry_core::booking::{BookingStatus, PaymentStatus};
use ticketry_core::types::DbId;

use crate::models::booking::{
    BookingLineItem, BookingOrder, CreateBookingLineItem, CreateBookingOrder,
};

const COLUMNS: &str = "id, user_id, event_id, slot_id, total_cents, booking_status, \
                        payment_status, payment_reference, created_at, updated_at";

const LINE_COLUMNS: &str =
    "id, order_id, seat_category_id, num_seats, price_per_seat, total_cents, created_at";

pub struct BookingOrderRepo;

impl BookingOrderRepo {
    /// Insert a `PROCESSING` / `PENDING` order.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateBookingOrder,
    ) -> Result<BookingOrder, sqlx::Error> {
        let query = format!(
            "INSERT INTO booking_orders (user_id, event_id, slot_id, total_cents)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BookingOrder>(&query)
            .bind(input.user_id)
            .bind(input.event_id)
            .bind(input.slot_id)
            .bind(input.total_cents)
            .fetch_one(conn)
            .await
    }

    pub async fn add_line_item(
        conn: &mut PgConnection,
        input: &CreateBookingLineItem,
    ) -> Result<BookingLineItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO booking_line_items
                (order_id, seat_category_id, num_seats, price_per_seat, total_cents)
             VALUES ($1, $2, $3, $4, $3::BIGINT * $4)
             RETURNING {LINE_COLUMNS}"
        );
        sqlx::query_as::<_, BookingLineItem>(&query)
            .bind(input.order_id)
            .bind(input.seat_category_id)
            .bind(input.num_seats)
            .bind(input.price_per_seat)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BookingOrder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM booking_orders WHERE id = $1");
        sqlx::query_as::<_, BookingOrder>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an order row for the rest of the transaction, but only while it
    /// is still `PROCESSING`. Concurrent callbacks for the same order block
    /// here and then see `None`.
    pub async fn find_processing_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<BookingOrder>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM booking_orders
             WHERE id = $1 AND booking_status = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, BookingOrder>(&query)
            .bind(id)
            .bind(BookingStatus::Processing.as_str())
            .fetch_optional(conn)
            .await
    }

    pub async fn list_line_items(
        conn: &mut PgConnection,
        order_id: DbId,
    ) -> Result<Vec<BookingLineItem>, sqlx::Error> {
        let query = format!(
            "SELECT {LINE_COLUMNS} FROM booking_line_items WHERE order_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, BookingLineItem>(&query)
            .bind(order_id)
            .fetch_all(conn)
            .await
    }

    /// Whether the user already has a `PROCESSING` or `APPROVED` order for
    /// this event, slot, and seat category.
    pub async fn has_active_booking(
        conn: &mut PgConnection,
        user_id: DbId,
        event_id: DbId,
        slot_id: DbId,
        seat_category_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM booking_orders o
                JOIN booking_line_items li ON li.order_id = o.id
                WHERE o.user_id = $1 AND o.event_id = $2 AND o.slot_id = $3
                  AND li.seat_category_id = $4
                  AND o.booking_status IN ($5, $6)
             )",
        )
        .bind(user_id)
        .bind(event_id)
        .bind(slot_id)
        .bind(seat_category_id)
        .bind(BookingStatus::Processing.as_str())
        .bind(BookingStatus::Approved.as_str())
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Bind the provider order id to a `PROCESSING` order that has none yet.
    ///
    /// Returns `false` if the order already settled or is already bound.
    pub async fn attach_provider_order(
        pool: &PgPool,
        id: DbId,
        provider_order_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE booking_orders SET payment_reference = $2
             WHERE id = $1 AND booking_status = $3 AND payment_reference IS NULL",
        )
        .bind(id)
        .bind(provider_order_id)
        .bind(BookingStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set both statuses and, when given, the payment reference.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        booking_status: BookingStatus,
        payment_status: PaymentStatus,
        payment_reference: Option<&str>,
    ) -> Result<BookingOrder, sqlx::Error> {
        let query = format!(
            "UPDATE booking_orders SET
                booking_status = $2,
                payment_status = $3,
                payment_reference = COALESCE($4, payment_reference)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BookingOrder>(&query)
            .bind(id)
            .bind(booking_status.as_str())
            .bind(payment_status.as_str())
            .bind(payment_reference)
            .fetch_one(conn)
            .await
    }
}
