//! Application tracking facade.

pub mod tracker;

pub use tracker::Tracker;
