//! Identity and consent management.

pub mod manager;

pub use manager::{IdentityManager, WritePolicy};
