//! Handlers for the `/bookings` resource.
//!
//! A booking holds seats, opens a provider order and waits for the buyer to
//! come back through the confirm or cancel callback. Seat counters and order
//! status always change together inside one transaction.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use ticketry_core::booking::{
    check_line, format_cents, order_total, to_cents, validate_line_shape, BookingStatus,
    EventStatus, LineRequest, Settlement,
};
use ticketry_core::error::CoreError;
use ticketry_core::types::DbId;
use ticketry_db::models::booking::{
    BookingLineItem, BookingOrder, CreateBookingLineItem, CreateBookingOrder,
};
use ticketry_db::models::event::{Event, EventSlot};
use ticketry_db::repositories::{
    BookingOrderRepo, EventRepo, SeatCategoryRepo, SlotRepo, UserRepo,
};
use ticketry_notifications::templates::{BookingConfirmation, ConfirmationLine};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /bookings/book`.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: DbId,
    pub slot_id: DbId,
    pub event_date: NaiveDate,
    pub seat_categories: Vec<SeatLineRequest>,
}

/// One seat category line. `price_per_seat` is in currency units and must
/// match the stored price.
#[derive(Debug, Deserialize)]
pub struct SeatLineRequest {
    pub seat_category_id: DbId,
    pub num_seats: i32,
    pub price_per_seat: f64,
}

#[derive(Debug, Serialize)]
pub struct BookingCreated {
    pub order_id: DbId,
    pub total_amount: String,
    pub currency: String,
    pub booking_status: String,
    pub payment_status: String,
    /// Provider page the buyer must visit. Absent for free bookings.
    pub approval_url: Option<String>,
    /// Where to send the buyer directly. Present for free bookings only.
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub order: BookingOrder,
    pub line_items: Vec<BookingLineItem>,
}

/// Query string of the provider's return redirect.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub order_id: DbId,
    /// Provider order id to capture.
    pub token: String,
}

/// Query string of the provider's cancel redirect.
#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub order_id: DbId,
}

/// A validated request line, paired with its category.
#[derive(Debug)]
struct PlannedLine {
    seat_category_id: DbId,
    line: LineRequest,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/bookings/book
///
/// Hold the requested seats and open a provider order. A zero-total order is
/// approved immediately without contacting the provider.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BookingCreated>>)> {
    let planned = plan_lines(&input.seat_categories)?;
    let event = load_bookable_event(&state, input.event_id, input.event_date).await?;
    let slot = load_bookable_slot(&state, &event, input.slot_id, input.event_date).await?;

    let mut tx = state.pool.begin().await?;
    for planned_line in &planned {
        hold_line(&mut tx, auth.user_id, &event, &slot, planned_line).await?;
    }

    let lines: Vec<LineRequest> = planned.iter().map(|p| p.line).collect();
    let total = order_total(&lines);
    let order = BookingOrderRepo::create(
        &mut tx,
        &CreateBookingOrder {
            user_id: auth.user_id,
            event_id: event.id,
            slot_id: slot.id,
            total_cents: total,
        },
    )
    .await?;
    for planned_line in &planned {
        BookingOrderRepo::add_line_item(
            &mut tx,
            &CreateBookingLineItem {
                order_id: order.id,
                seat_category_id: planned_line.seat_category_id,
                num_seats: planned_line.line.num_seats,
                price_per_seat: planned_line.line.price_per_seat,
            },
        )
        .await?;
    }

    if total == 0 {
        let order = settle_order(&mut tx, order.id, Settlement::Approve, None)
            .await?
            .ok_or_else(|| AppError::InternalError("New order is not processing".into()))?;
        tx.commit().await?;
        tracing::info!(order_id = order.id, user_id = auth.user_id, "Free booking approved");
        send_confirmation(&state, &order).await;

        return Ok((
            StatusCode::CREATED,
            Json(DataResponse {
                data: BookingCreated {
                    order_id: order.id,
                    total_amount: format_cents(order.total_cents),
                    currency: state.config.payment_currency.clone(),
                    booking_status: order.booking_status,
                    payment_status: order.payment_status,
                    approval_url: None,
                    redirect_url: Some(frontend_url(
                        &state,
                        "/booking-success",
                        &[("order_id", order.id.to_string())],
                    )),
                },
            }),
        ));
    }
    tx.commit().await?;

    let provider_order = match state.payments.create_order(total, order.id).await {
        Ok(Some(provider_order)) => provider_order,
        Ok(None) => {
            fail_unopened_order(&state, order.id).await?;
            return Err(CoreError::ExternalService(
                "Payment provider returned no approval link".into(),
            )
            .into());
        }
        Err(e) => {
            tracing::warn!(order_id = order.id, error = %e, "Payment order creation failed");
            fail_unopened_order(&state, order.id).await?;
            return Err(CoreError::ExternalService(format!("Payment provider error: {e}")).into());
        }
    };

    if !BookingOrderRepo::attach_provider_order(&state.pool, order.id, &provider_order.id).await? {
        return Err(AppError::InternalError(format!(
            "Order {} settled before its payment was opened",
            order.id
        )));
    }

    tracing::info!(
        order_id = order.id,
        user_id = auth.user_id,
        provider_order_id = %provider_order.id,
        total = %format_cents(total),
        "Booking created, awaiting payment approval"
    );
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BookingCreated {
                order_id: order.id,
                total_amount: format_cents(order.total_cents),
                currency: state.config.payment_currency.clone(),
                booking_status: order.booking_status,
                payment_status: order.payment_status,
                approval_url: Some(provider_order.approval_url),
                redirect_url: None,
            },
        }),
    ))
}

/// GET /api/v1/bookings/confirm?order_id=..&token=..
///
/// Provider return URL. Captures the payment, settles the order and
/// redirects the browser to the matching frontend page.
///
/// The token must be the provider order opened for this booking; any other
/// token is refused before the provider is contacted.
pub async fn confirm(State(state): State<AppState>, Query(query): Query<ConfirmQuery>) -> Response {
    match BookingOrderRepo::find_by_id(&state.pool, query.order_id).await {
        Ok(Some(order)) if order.booking_status != BookingStatus::Processing.as_str() => {
            return error_redirect(&state, "Invalid order state");
        }
        Ok(Some(order)) if order.payment_reference.as_deref() != Some(query.token.as_str()) => {
            tracing::warn!(
                order_id = order.id,
                token = %query.token,
                "Confirm token does not match the order's payment"
            );
            return error_redirect(&state, "Payment does not match this order");
        }
        Ok(Some(_)) => {}
        Ok(None) => return error_redirect(&state, "Order not found"),
        Err(e) => {
            tracing::error!(order_id = query.order_id, error = %e, "Order lookup failed");
            return error_redirect(&state, "Order lookup failed");
        }
    }

    let capture = state.payments.capture(&query.token).await;
    let (settlement, capture_id, capture_error) = match capture {
        Ok(outcome) if !reference_matches(outcome.reference_id.as_deref(), query.order_id) => {
            tracing::error!(
                order_id = query.order_id,
                reference_id = ?outcome.reference_id,
                "Captured payment belongs to another order"
            );
            return error_redirect(&state, "Payment does not match this order");
        }
        Ok(outcome) => (
            Settlement::from_capture_status(&outcome.status),
            outcome.capture_id,
            None,
        ),
        Err(e) => {
            tracing::warn!(order_id = query.order_id, error = %e, "Payment capture failed");
            (Settlement::Fail, None, Some(e.to_string()))
        }
    };

    let settled =
        settle_in_transaction(&state, query.order_id, settlement, capture_id.as_deref()).await;
    let settled = match settled {
        Ok(settled) => settled,
        Err(e) => {
            tracing::error!(order_id = query.order_id, error = %e, "Order settlement failed");
            return error_redirect(&state, "Order could not be updated");
        }
    };
    let Some(order) = settled else {
        // Another callback settled it between the lookup and the lock.
        return error_redirect(&state, "Invalid order state");
    };

    tracing::info!(order_id = order.id, status = %order.booking_status, "Booking settled");
    match (settlement, capture_error) {
        (Settlement::Approve, _) => {
            send_confirmation(&state, &order).await;
            redirect(&frontend_url(
                &state,
                "/booking-success",
                &[("order_id", order.id.to_string())],
            ))
        }
        (_, Some(message)) => error_redirect(&state, &message),
        _ => redirect(&frontend_url(&state, "/booking-failure", &[])),
    }
}

/// GET /api/v1/bookings/cancel?order_id=..
///
/// Provider cancel URL. Releases the held seats of a still-processing order;
/// any other order is left untouched.
pub async fn cancel(State(state): State<AppState>, Query(query): Query<CancelQuery>) -> Response {
    match BookingOrderRepo::find_by_id(&state.pool, query.order_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_redirect(&state, "Order not found"),
        Err(e) => {
            tracing::error!(order_id = query.order_id, error = %e, "Order lookup failed");
            return error_redirect(&state, "Order lookup failed");
        }
    }

    match settle_in_transaction(&state, query.order_id, Settlement::Cancel, None).await {
        Ok(Some(order)) => tracing::info!(order_id = order.id, "Booking cancelled by buyer"),
        Ok(None) => {
            tracing::debug!(order_id = query.order_id, "Cancel callback for settled order ignored")
        }
        Err(e) => {
            tracing::error!(order_id = query.order_id, error = %e, "Order cancellation failed");
            return error_redirect(&state, "Order could not be updated");
        }
    }

    redirect(&frontend_url(
        &state,
        "/booking-failure",
        &[("order_id", query.order_id.to_string())],
    ))
}

/// GET /api/v1/bookings/{id}
///
/// One of the caller's own orders with its line items.
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<DbId>,
) -> AppResult<Json<DataResponse<BookingDetail>>> {
    let order = BookingOrderRepo::find_by_id(&state.pool, order_id)
        .await?
        .filter(|o| o.user_id == auth.user_id)
        .ok_or(CoreError::NotFound {
            entity: "BookingOrder",
            id: order_id,
        })?;

    let mut conn = state.pool.acquire().await?;
    let line_items = BookingOrderRepo::list_line_items(&mut conn, order.id).await?;
    Ok(Json(DataResponse {
        data: BookingDetail { order, line_items },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Decode and shape-check the request lines before touching the database.
fn plan_lines(requested: &[SeatLineRequest]) -> AppResult<Vec<PlannedLine>> {
    if requested.is_empty() {
        return Err(CoreError::Validation("At least one seat category is required".into()).into());
    }

    let mut seen = HashSet::new();
    requested
        .iter()
        .map(|req| -> AppResult<PlannedLine> {
            if !seen.insert(req.seat_category_id) {
                return Err(CoreError::Validation(format!(
                    "Seat category {} is listed more than once",
                    req.seat_category_id
                ))
                .into());
            }
            let line = LineRequest {
                num_seats: req.num_seats,
                price_per_seat: to_cents(req.price_per_seat)?,
            };
            validate_line_shape(&line)?;
            Ok(PlannedLine {
                seat_category_id: req.seat_category_id,
                line,
            })
        })
        .collect()
}

async fn load_bookable_event(state: &AppState, event_id: DbId, date: NaiveDate) -> AppResult<Event> {
    let event = EventRepo::find_by_id(&state.pool, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Event",
            id: event_id,
        })?;

    let status = EventStatus::from_str(&event.status).map_err(AppError::InternalError)?;
    if status != EventStatus::Active {
        return Err(CoreError::Validation("Event is not open for booking".into()).into());
    }
    if !event.event_dates.contains(&date) {
        return Err(CoreError::Validation(format!("Event does not run on {date}")).into());
    }
    Ok(event)
}

async fn load_bookable_slot(
    state: &AppState,
    event: &Event,
    slot_id: DbId,
    date: NaiveDate,
) -> AppResult<EventSlot> {
    let slot = SlotRepo::find_by_id(&state.pool, slot_id)
        .await?
        .filter(|s| s.event_id == event.id && s.slot_date == date)
        .ok_or(CoreError::NotFound {
            entity: "EventSlot",
            id: slot_id,
        })?;
    if !slot.is_active {
        return Err(CoreError::Validation("Slot is not open for booking".into()).into());
    }
    Ok(slot)
}

/// Check one line against its locked category row, then hold the seats.
async fn hold_line(
    conn: &mut PgConnection,
    user_id: DbId,
    event: &Event,
    slot: &EventSlot,
    planned: &PlannedLine,
) -> AppResult<()> {
    let category = SeatCategoryRepo::find_for_update(&mut *conn, planned.seat_category_id)
        .await?
        .filter(|c| c.slot_id == slot.id && c.is_active)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Seat category {} is not available for this slot",
                planned.seat_category_id
            ))
        })?;

    let has_active = BookingOrderRepo::has_active_booking(
        &mut *conn,
        user_id,
        event.id,
        slot.id,
        category.id,
    )
    .await?;
    check_line(
        &category.label,
        &planned.line,
        &category.counters(),
        category.price_cents,
        has_active,
    )?;

    if !SeatCategoryRepo::hold(&mut *conn, category.id, planned.line.num_seats).await? {
        return Err(CoreError::Validation(format!(
            "Not enough seats available for '{}'",
            category.label
        ))
        .into());
    }
    Ok(())
}

/// Apply a terminal outcome to a `PROCESSING` order: move or release its held
/// seats and set both statuses. Returns `None` when the order is no longer
/// processing.
async fn settle_order(
    conn: &mut PgConnection,
    order_id: DbId,
    settlement: Settlement,
    payment_reference: Option<&str>,
) -> Result<Option<BookingOrder>, sqlx::Error> {
    let Some(order) = BookingOrderRepo::find_processing_for_update(&mut *conn, order_id).await?
    else {
        return Ok(None);
    };

    for item in BookingOrderRepo::list_line_items(&mut *conn, order.id).await? {
        match settlement {
            Settlement::Approve => {
                SeatCategoryRepo::commit(&mut *conn, item.seat_category_id, item.num_seats).await?
            }
            Settlement::Fail | Settlement::Cancel => {
                SeatCategoryRepo::release(&mut *conn, item.seat_category_id, item.num_seats).await?
            }
        }
    }

    let order = BookingOrderRepo::set_status(
        &mut *conn,
        order.id,
        settlement.booking_status(),
        settlement.payment_status(),
        payment_reference,
    )
    .await?;
    Ok(Some(order))
}

async fn settle_in_transaction(
    state: &AppState,
    order_id: DbId,
    settlement: Settlement,
    payment_reference: Option<&str>,
) -> Result<Option<BookingOrder>, sqlx::Error> {
    let mut tx = state.pool.begin().await?;
    let order = settle_order(&mut tx, order_id, settlement, payment_reference).await?;
    tx.commit().await?;
    Ok(order)
}

/// The provider never opened an order: release the holds and mark it failed.
async fn fail_unopened_order(state: &AppState, order_id: DbId) -> AppResult<()> {
    settle_in_transaction(state, order_id, Settlement::Fail, None).await?;
    tracing::info!(order_id, "Booking failed before payment, seats released");
    Ok(())
}

/// Best effort: every failure is logged and dropped.
async fn send_confirmation(state: &AppState, order: &BookingOrder) {
    let email = match confirmation_email(state, order).await {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!(order_id = order.id, error = %e, "Confirmation email not built");
            return;
        }
    };
    if let Err(e) = state.email.send(&email).await {
        tracing::warn!(order_id = order.id, error = %e, "Confirmation email not sent");
    }
}

async fn confirmation_email(
    state: &AppState,
    order: &BookingOrder,
) -> AppResult<ticketry_notifications::email::OutgoingEmail> {
    let user = UserRepo::find_by_id(&state.pool, order.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order owner no longer exists".into()))?;
    let event = EventRepo::find_by_id(&state.pool, order.event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Event",
            id: order.event_id,
        })?;
    let slot = SlotRepo::find_by_id(&state.pool, order.slot_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "EventSlot",
            id: order.slot_id,
        })?;

    let mut conn = state.pool.acquire().await?;
    let items = BookingOrderRepo::list_line_items(&mut conn, order.id).await?;
    drop(conn);

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let label = SeatCategoryRepo::find_by_id(&state.pool, item.seat_category_id)
            .await?
            .map(|c| c.label)
            .unwrap_or_else(|| format!("Category {}", item.seat_category_id));
        lines.push(ConfirmationLine {
            label,
            num_seats: item.num_seats,
            price_per_seat: item.price_per_seat,
            total: item.total_cents,
        });
    }

    let confirmation = BookingConfirmation {
        order_id: order.id,
        event_title: event.title,
        slot_date: slot.slot_date,
        start_time: slot.start_time,
        currency: state.config.payment_currency.clone(),
        lines,
        total: order.total_cents,
    };
    Ok(confirmation.render(&user.email))
}

/// A capture that echoes no reference is accepted; one that echoes another
/// booking id is not.
fn reference_matches(reference_id: Option<&str>, order_id: DbId) -> bool {
    reference_id.map_or(true, |r| r == order_id.to_string())
}

/// Absolute frontend URL with an encoded query string.
fn frontend_url(state: &AppState, path: &str, params: &[(&str, String)]) -> String {
    let raw = format!("{}{path}", state.config.frontend_url);
    if params.is_empty() {
        return raw;
    }
    match reqwest::Url::parse_with_params(&raw, params) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!(url = %raw, error = %e, "Frontend URL is not valid");
            raw
        }
    }
}

fn error_redirect(state: &AppState, message: &str) -> Response {
    redirect(&frontend_url(
        state,
        "/booking/error",
        &[("message", message.to_string())],
    ))
}

/// 302 Found, which `axum::response::Redirect` has no constructor for.
fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn line(id: DbId, seats: i32, price: f64) -> SeatLineRequest {
        SeatLineRequest {
            seat_category_id: id,
            num_seats: seats,
            price_per_seat: price,
        }
    }

    #[test]
    fn plan_converts_prices_to_cents() {
        let planned = plan_lines(&[line(1, 2, 25.5), line(2, 1, 0.0)]).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].line.price_per_seat, 2550);
        assert_eq!(planned[1].line.total(), 0);
    }

    #[test]
    fn capture_reference_must_name_the_order() {
        assert!(reference_matches(Some("42"), 42));
        assert!(reference_matches(None, 42));
        assert!(!reference_matches(Some("41"), 42));
    }

    #[test]
    fn plan_rejects_empty_and_duplicate_lines() {
        assert_matches!(
            plan_lines(&[]),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            plan_lines(&[line(4, 1, 10.0), line(4, 2, 10.0)]),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn plan_rejects_bad_shapes() {
        assert_matches!(
            plan_lines(&[line(1, 0, 10.0)]),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            plan_lines(&[line(1, 21, 10.0)]),
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            plan_lines(&[line(1, 1, f64::NAN)]),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn redirect_is_302_with_location() {
        let response = redirect("http://localhost:3000/booking-failure");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION],
            "http://localhost:3000/booking-failure"
        );
    }
}
