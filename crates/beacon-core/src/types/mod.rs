//! Core type definitions used across the Beacon workspace.

pub mod id;
pub mod time;

pub use id::*;
pub use time::{from_millis, to_millis};
