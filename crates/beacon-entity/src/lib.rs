//! # beacon-entity
//!
//! Domain entity models for Beacon: the outbound event queue, the app
//! inbox, identity state, and the push metadata enums. Entities are plain
//! serde types; the database crate maps them to and from rows.

#[macro_use]
mod mapping;

pub mod event;
pub mod identity;
pub mod inbox;
pub mod push;

pub use mapping::UnknownVariant;
