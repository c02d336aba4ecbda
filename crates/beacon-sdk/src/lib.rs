//! Beacon engagement SDK.
//!
//! [`Beacon`] is an explicitly constructed instance: build it from an
//! [`AppConfig`](beacon_core::config::AppConfig), optionally supplying
//! transport and media collaborators, then start it.

pub mod beacon;
pub mod builder;

#[cfg(test)]
pub(crate) mod test_support;

pub use beacon::Beacon;
pub use builder::BeaconBuilder;

pub use beacon_core::config::AppConfig;
pub use beacon_core::events::CoreEvent;
pub use beacon_core::{AppError, AppResult};
