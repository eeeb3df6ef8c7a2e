//! Authentication primitives: JWT signing/validation and password hashing.

pub mod jwt;
pub mod password;
