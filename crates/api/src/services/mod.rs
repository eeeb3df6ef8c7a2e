//! Domain services composing the ephemeral store, the relational store, and
//! the auth primitives.

pub mod device_trust;
pub mod otp_store;
pub mod presence;
pub mod token_store;
