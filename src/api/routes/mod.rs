//! API Route Handlers

pub mod diff;
pub mod health;
pub mod notify;
