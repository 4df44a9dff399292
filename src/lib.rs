//! Bloom - Client-Side Attempt Limiter
//!
//! This crate implements the attempt limiter that guards Bloom's sign-in and
//! password-reset flows. Attempt counts live in a pluggable key-value store,
//! and a failing store never blocks a legitimate user.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;
