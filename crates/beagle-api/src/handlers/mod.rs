//! HTTP request handlers for the inspection API.
//!
//! Handlers are read-only: they report service health and the peripherals
//! the activity directory currently sees.

pub mod activity;
pub mod health;

pub use activity::list_activity;
pub use health::{health_check, liveness_check};
