//! Core domain types and pure helpers shared across the Canopy backend.

pub mod codes;
pub mod error;
pub mod presence;
pub mod types;
