//! Plain data structs mapping table rows, plus create/update DTOs.

pub mod device;
pub mod point;
pub mod presence_session;
pub mod user;
