//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Pool-level methods take `&PgPool`; methods that must run inside a caller's
//! transaction take `&mut PgConnection` (pass `&mut *tx`).

pub mod booking_order_repo;
pub mod device_session_repo;
pub mod event_repo;
pub mod seat_category_repo;
pub mod slot_repo;
pub mod user_repo;

pub use booking_order_repo::BookingOrderRepo;
pub use device_session_repo::DeviceSessionRepo;
pub use event_repo::EventRepo;
pub use seat_category_repo::SeatCategoryRepo;
pub use slot_repo::SlotRepo;
pub use user_repo::UserRepo;
