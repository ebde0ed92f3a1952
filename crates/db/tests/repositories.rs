//! Integration tests for the repository layer.
//!
//! Each test gets a fresh database with all migrations applied.

use chrono::NaiveDate;
use sqlx::PgPool;
use ticketry_core::booking::{BookingStatus, PaymentStatus};
use ticketry_core::login_policy::LoginStatus;
use ticketry_db::models::booking::{CreateBookingLineItem, CreateBookingOrder};
use ticketry_db::models::device_session::CreateDeviceSession;
use ticketry_db::models::event::{CreateEvent, CreateEventSlot, CreateSeatCategory};
use ticketry_db::models::user::CreateUser;
use ticketry_db::repositories::{
    BookingOrderRepo, DeviceSessionRepo, EventRepo, SeatCategoryRepo, SlotRepo, UserRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, email: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role_id: None,
            email_verified: true,
            login_status: LoginStatus::Active,
            days_180_flag: false,
        },
    )
    .await
    .unwrap()
    .id
}

fn new_session(user_id: i64, fingerprint: &str) -> CreateDeviceSession {
    CreateDeviceSession {
        user_id,
        device_fingerprint: fingerprint.to_string(),
        device_name: "Windows 10".to_string(),
        device_type: "Windows PC".to_string(),
        browser_family: "Chrome".to_string(),
        os_family: "Windows".to_string(),
        device_family: "Other".to_string(),
        ip_address: "203.0.113.7".to_string(),
        ..Default::default()
    }
}

/// Event -> slot -> one seat category; returns (event, slot, category) ids.
async fn new_inventory(pool: &PgPool, total: i32) -> (i64, i64, i64) {
    let date = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
    let event = EventRepo::create(
        pool,
        &CreateEvent {
            title: "Concert".to_string(),
            status: "ACTIVE".to_string(),
            event_dates: vec![date],
            location: None,
        },
    )
    .await
    .unwrap();
    let slot = SlotRepo::create(
        pool,
        &CreateEventSlot {
            event_id: event.id,
            slot_date: date,
            start_time: "19:00".to_string(),
            duration_minutes: 120,
        },
    )
    .await
    .unwrap();
    let category = SeatCategoryRepo::create(
        pool,
        &CreateSeatCategory {
            slot_id: slot.id,
            label: "General".to_string(),
            price_cents: 1000,
            total_tickets: total,
        },
    )
    .await
    .unwrap();
    (event.id, slot.id, category.id)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn user_email_lookup_is_case_insensitive(pool: PgPool) {
    let id = new_user(&pool, "Alice@Example.com").await;
    let found = UserRepo::find_by_email(&pool, "ALICE@example.COM")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.email, "alice@example.com");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn user_duplicate_email_rejected(pool: PgPool) {
    new_user(&pool, "bob@example.com").await;
    let err = UserRepo::create(
        &pool,
        &CreateUser {
            email: "BOB@example.com".to_string(),
            password_hash: "hash".to_string(),
            role_id: None,
            email_verified: true,
            login_status: LoginStatus::Active,
            days_180_flag: false,
        },
    )
    .await
    .unwrap_err();
    let db_err = err.as_database_error().unwrap();
    assert_eq!(db_err.code().as_deref(), Some("23505"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_login_lock_and_success_reset(pool: PgPool) {
    let id = new_user(&pool, "carol@example.com").await;

    let user = UserRepo::record_failed_login(&pool, id, 3).await.unwrap();
    assert_eq!(user.status(), Ok(LoginStatus::Active));
    assert_eq!(user.failure_login_attempts, 1);
    assert!(user.last_login.is_none());

    UserRepo::record_failed_login(&pool, id, 3).await.unwrap();
    let user = UserRepo::record_failed_login(&pool, id, 3).await.unwrap();
    assert_eq!(user.status(), Ok(LoginStatus::Locked));
    assert_eq!(user.failure_login_attempts, 3);
    let locked_at = user.last_login.expect("lock stamps last_login");

    // Further failures while locked keep the original lock stamp.
    let user = UserRepo::record_failed_login(&pool, id, 3).await.unwrap();
    assert_eq!(user.failure_login_attempts, 4);
    assert_eq!(user.last_login, Some(locked_at));

    UserRepo::unlock(&pool, id).await.unwrap();
    let user = UserRepo::record_successful_login(&pool, id, LoginStatus::Active)
        .await
        .unwrap();
    assert_eq!(user.status(), Ok(LoginStatus::Active));
    assert_eq!(user.failure_login_attempts, 0);
    assert_eq!(user.successful_login_count, 1);
}

// ---------------------------------------------------------------------------
// Device sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminate_is_idempotent(pool: PgPool) {
    let user_id = new_user(&pool, "dave@example.com").await;
    let session = DeviceSessionRepo::create(&pool, &new_session(user_id, "fp1"))
        .await
        .unwrap();

    assert!(DeviceSessionRepo::terminate(&pool, session.id).await.unwrap());
    let first = DeviceSessionRepo::find_by_id(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!first.is_active);

    assert!(DeviceSessionRepo::terminate(&pool, session.id).await.unwrap());
    let second = DeviceSessionRepo::find_by_id(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.logged_out_at, second.logged_out_at);

    assert!(!DeviceSessionRepo::terminate(&pool, 999_999).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reusable_session_matches_fingerprint_and_browser(pool: PgPool) {
    let user_id = new_user(&pool, "erin@example.com").await;
    let session = DeviceSessionRepo::create(&pool, &new_session(user_id, "fp1"))
        .await
        .unwrap();

    let found = DeviceSessionRepo::find_reusable(&pool, user_id, "fp1", "Chrome")
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id), Some(session.id));
    assert!(DeviceSessionRepo::find_reusable(&pool, user_id, "fp1", "Firefox")
        .await
        .unwrap()
        .is_none());

    DeviceSessionRepo::terminate(&pool, session.id).await.unwrap();
    assert!(DeviceSessionRepo::find_reusable(&pool, user_id, "fp1", "Chrome")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminate_all_keeps_named_session(pool: PgPool) {
    let user_id = new_user(&pool, "frank@example.com").await;
    let mut ids = Vec::new();
    for i in 0..3 {
        let s = DeviceSessionRepo::create(&pool, &new_session(user_id, &format!("fp{i}")))
            .await
            .unwrap();
        ids.push(s.id);
    }

    let count = DeviceSessionRepo::terminate_all_for_user(&pool, user_id, Some(ids[1]))
        .await
        .unwrap();
    assert_eq!(count, 2);
    let active = DeviceSessionRepo::list_active_ids_by_recency(&pool, user_id)
        .await
        .unwrap();
    assert_eq!(active, vec![ids[1]]);
}

// ---------------------------------------------------------------------------
// Seat counters and orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn hold_refuses_oversell(pool: PgPool) {
    let (_, _, category_id) = new_inventory(&pool, 5).await;
    let mut conn = pool.acquire().await.unwrap();

    assert!(SeatCategoryRepo::hold(&mut conn, category_id, 3).await.unwrap());
    assert!(!SeatCategoryRepo::hold(&mut conn, category_id, 3).await.unwrap());
    SeatCategoryRepo::commit(&mut conn, category_id, 3).await.unwrap();

    let category = SeatCategoryRepo::find_by_id(&pool, category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((category.booked, category.held), (3, 0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_guard_ignores_failed_orders(pool: PgPool) {
    let user_id = new_user(&pool, "gina@example.com").await;
    let (event_id, slot_id, category_id) = new_inventory(&pool, 5).await;
    let mut tx = pool.begin().await.unwrap();

    let order = BookingOrderRepo::create(
        &mut tx,
        &CreateBookingOrder {
            user_id,
            event_id,
            slot_id,
            total_cents: 2000,
        },
    )
    .await
    .unwrap();
    let line = BookingOrderRepo::add_line_item(
        &mut tx,
        &CreateBookingLineItem {
            order_id: order.id,
            seat_category_id: category_id,
            num_seats: 2,
            price_per_seat: 1000,
        },
    )
    .await
    .unwrap();
    assert_eq!(line.total_cents, 2000);

    assert!(BookingOrderRepo::has_active_booking(&mut tx, user_id, event_id, slot_id, category_id)
        .await
        .unwrap());

    let failed = BookingOrderRepo::set_status(
        &mut tx,
        order.id,
        BookingStatus::Failed,
        PaymentStatus::Failed,
        None,
    )
    .await
    .unwrap();
    assert_eq!(failed.status(), Ok(BookingStatus::Failed));
    assert!(!BookingOrderRepo::has_active_booking(&mut tx, user_id, event_id, slot_id, category_id)
        .await
        .unwrap());

    assert!(BookingOrderRepo::find_processing_for_update(&mut tx, order.id)
        .await
        .unwrap()
        .is_none());
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn provider_order_is_attached_once(pool: PgPool) {
    let user_id = new_user(&pool, "hana@example.com").await;
    let (event_id, slot_id, _) = new_inventory(&pool, 5).await;
    let mut conn = pool.acquire().await.unwrap();
    let order = BookingOrderRepo::create(
        &mut conn,
        &CreateBookingOrder {
            user_id,
            event_id,
            slot_id,
            total_cents: 1000,
        },
    )
    .await
    .unwrap();
    drop(conn);

    assert!(BookingOrderRepo::attach_provider_order(&pool, order.id, "PP-1").await.unwrap());
    assert!(!BookingOrderRepo::attach_provider_order(&pool, order.id, "PP-2").await.unwrap());

    let stored = BookingOrderRepo::find_by_id(&pool, order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_reference.as_deref(), Some("PP-1"));
}
