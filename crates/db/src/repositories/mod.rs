//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument. Methods that must participate in the
//! atomic session-close transaction take `&mut PgConnection` instead.

pub mod device_repo;
pub mod point_repo;
pub mod presence_session_repo;
pub mod user_repo;

pub use device_repo::DeviceRepo;
pub use point_repo::PointRepo;
pub use presence_session_repo::PresenceSessionRepo;
pub use user_repo::UserRepo;
