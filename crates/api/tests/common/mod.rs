#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use ticketry_api::auth::jwt::{JwtConfig, TokenService};
use ticketry_api::auth::keys::KeyManager;
use ticketry_api::auth::password::hash_password;
use ticketry_api::auth::revocation::InMemoryRevocationStore;
use ticketry_api::config::ServerConfig;
use ticketry_api::geo::{DisabledLocator, GeoLocator, Location};
use ticketry_api::routes;
use ticketry_api::sessions::SessionManager;
use ticketry_api::state::AppState;
use ticketry_core::login_policy::LoginStatus;
use ticketry_core::types::{Cents, DbId};
use ticketry_db::models::event::{CreateEvent, CreateEventSlot, CreateSeatCategory};
use ticketry_db::models::user::{CreateUser, User};
use ticketry_db::repositories::{EventRepo, SeatCategoryRepo, SlotRepo, UserRepo};
use ticketry_notifications::email::{EmailError, EmailSender, OutgoingEmail};
use ticketry_payments::{CaptureOutcome, PaymentError, PaymentGateway, ProviderOrder};

/// Browser user agent sent with every helper request.
pub const TEST_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const TEST_PASSWORD: &str = "test_password_123!";

pub const FRONTEND_URL: &str = "http://localhost:5173";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin and frontend (matching the
/// dev default), a 30-second request timeout, and no geolocation.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![FRONTEND_URL.to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            key_dir: PathBuf::from("unused"),
            key_refresh_days: 30,
            issuer: "ticketry-test".to_string(),
            audience: "ticketry-test-clients".to_string(),
            access_token_expiry_secs: 3600,
            refresh_token_expiry_days: 7,
        },
        cookie_secure: false,
        frontend_url: FRONTEND_URL.to_string(),
        geolocation_url: None,
        payment_currency: "AUD".to_string(),
    }
}

/// One RSA key pair per test binary; generation is slow.
fn shared_keys() -> Arc<KeyManager> {
    static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(KeyManager::generate().expect("key generation should succeed")))
        .clone()
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Scriptable payment provider.
pub struct FakeGateway {
    pub fail_create: AtomicBool,
    pub omit_approval_link: AtomicBool,
    pub fail_capture: AtomicBool,
    pub capture_status: Mutex<String>,
    /// `(total, order_id)` of every provider order opened.
    pub created: Mutex<Vec<(Cents, DbId)>>,
    pub captured: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_create: AtomicBool::new(false),
            omit_approval_link: AtomicBool::new(false),
            fail_capture: AtomicBool::new(false),
            capture_status: Mutex::new("COMPLETED".to_string()),
            created: Mutex::new(Vec::new()),
            captured: Mutex::new(Vec::new()),
        })
    }

    pub fn set_capture_status(&self, status: &str) {
        *self.capture_status.lock().unwrap() = status.to_string();
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        total: Cents,
        order_id: DbId,
    ) -> Result<Option<ProviderOrder>, PaymentError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PaymentError::ApiError {
                status: 500,
                body: "provider unavailable".to_string(),
            });
        }
        self.created.lock().unwrap().push((total, order_id));
        if self.omit_approval_link.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(ProviderOrder {
            id: format!("PP-{order_id}"),
            approval_url: format!("https://paypal.test/checkoutnow?token=PP-{order_id}"),
        }))
    }

    async fn capture(&self, token: &str) -> Result<CaptureOutcome, PaymentError> {
        self.captured.lock().unwrap().push(token.to_string());
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(PaymentError::ApiError {
                status: 422,
                body: "ORDER_NOT_APPROVED".to_string(),
            });
        }
        Ok(CaptureOutcome {
            status: self.capture_status.lock().unwrap().clone(),
            capture_id: Some(format!("CAP-{token}")),
            reference_id: token.strip_prefix("PP-").map(str::to_string),
        })
    }
}

/// Locator answering from a fixed IP table, optionally after a delay.
#[derive(Default)]
pub struct FakeLocator {
    pub locations: Mutex<HashMap<String, Location>>,
    pub delay: Option<Duration>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeLocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A locator that takes `delay` before answering.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn place(&self, ip: &str, city: &str, country: &str, country_code: &str) {
        self.locations.lock().unwrap().insert(
            ip.to_string(),
            Location {
                city: Some(city.to_string()),
                country: Some(country.to_string()),
                country_code: Some(country_code.to_string()),
                timezone: Some("Australia/Sydney".to_string()),
                ..Location::default()
            },
        );
    }
}

#[async_trait]
impl GeoLocator for FakeLocator {
    async fn locate(&self, ip: &str) -> Option<Location> {
        self.lookups.lock().unwrap().push(ip.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.locations.lock().unwrap().get(ip).cloned()
    }
}

/// Email sender that keeps every message in memory.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build the full application router with all middleware layers, using the
/// given database pool and default fakes.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, FakeGateway::new(), Arc::new(RecordingEmail::default()))
}

/// Same as [`build_test_app`] with caller-held fakes for inspection.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app_with(
    pool: PgPool,
    payments: Arc<FakeGateway>,
    email: Arc<RecordingEmail>,
) -> Router {
    assemble(pool, payments, email, Arc::new(DisabledLocator))
}

/// Same as [`build_test_app`] with a caller-held locator.
pub fn build_test_app_with_geo(pool: PgPool, geo: Arc<dyn GeoLocator>) -> Router {
    assemble(
        pool,
        FakeGateway::new(),
        Arc::new(RecordingEmail::default()),
        geo,
    )
}

/// Session manager wired the way the test app wires it.
pub fn test_session_manager(pool: PgPool, geo: Arc<dyn GeoLocator>) -> SessionManager {
    SessionManager::new(pool, geo).with_lookup_timeout(GEO_TEST_TIMEOUT)
}

/// Lookup bound used by the test app, short enough to keep slow-locator
/// tests fast.
pub const GEO_TEST_TIMEOUT: Duration = Duration::from_millis(200);

fn assemble(
    pool: PgPool,
    payments: Arc<FakeGateway>,
    email: Arc<RecordingEmail>,
    geo: Arc<dyn GeoLocator>,
) -> Router {
    let config = test_config();
    let tokens = Arc::new(TokenService::new(
        shared_keys(),
        config.jwt.clone(),
        Arc::new(InMemoryRevocationStore::new()),
    ));
    let sessions = Arc::new(test_session_manager(pool.clone(), geo));

    let state = AppState {
        pool,
        config: Arc::new(config),
        tokens,
        sessions,
        payments,
        email,
    };

    let cors = CorsLayer::new()
        .allow_origin([FRONTEND_URL.parse().unwrap()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_AGENT, TEST_USER_AGENT)
        .header("x-forwarded-for", "203.0.113.10");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
}

pub async fn send(app: Router, req: Request<Body>) -> Response {
    app.oneshot(req).await.expect("router should respond")
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, request(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, request(Method::GET, uri, Some(token)).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let req = request(Method::POST, uri, None)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let req = request(Method::POST, uri, Some(token))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, request(Method::DELETE, uri, Some(token)).body(Body::empty()).unwrap()).await
}

/// Log in through the API and return the JSON body.
pub async fn login(app: Router, email: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({ "email": email, "password": password });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Access token from a successful login body.
pub fn access_token(login_body: &serde_json::Value) -> String {
    login_body["access_token"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

/// Create a verified user with [`TEST_PASSWORD`].
pub async fn seed_user(pool: &PgPool, email: &str, status: LoginStatus) -> User {
    let input = CreateUser {
        email: email.to_string(),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        role_id: Some(2),
        email_verified: true,
        login_status: status,
        days_180_flag: false,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

pub struct Inventory {
    pub event_id: DbId,
    pub slot_id: DbId,
    pub category_id: DbId,
    pub date: NaiveDate,
}

pub fn event_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 15).unwrap()
}

/// An active event with one slot and one seat category.
pub async fn seed_inventory(pool: &PgPool, price_cents: Cents, total_tickets: i32) -> Inventory {
    let date = event_date();
    let event = EventRepo::create(
        pool,
        &CreateEvent {
            title: "Harbour Lights Concert".to_string(),
            status: "ACTIVE".to_string(),
            event_dates: vec![date],
            location: Some("Sydney".to_string()),
        },
    )
    .await
    .unwrap();
    let slot = SlotRepo::create(
        pool,
        &CreateEventSlot {
            event_id: event.id,
            slot_date: date,
            start_time: "19:30".to_string(),
            duration_minutes: 120,
        },
    )
    .await
    .unwrap();
    let category = add_category(pool, slot.id, "Gold", price_cents, total_tickets).await;
    Inventory {
        event_id: event.id,
        slot_id: slot.id,
        category_id: category,
        date,
    }
}

pub async fn add_category(
    pool: &PgPool,
    slot_id: DbId,
    label: &str,
    price_cents: Cents,
    total_tickets: i32,
) -> DbId {
    SeatCategoryRepo::create(
        pool,
        &CreateSeatCategory {
            slot_id,
            label: label.to_string(),
            price_cents,
            total_tickets,
        },
    )
    .await
    .unwrap()
    .id
}
