//! # beacon-core
//!
//! Core crate for Beacon. Contains configuration schemas, typed
//! identifiers, the core event bus, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Beacon crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use events::{CoreEvent, EventBus};
pub use result::AppResult;
