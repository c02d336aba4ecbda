//! Notification intake and interaction handling.

pub mod service;

pub use service::{NotificationService, ORIGIN_KEY};
