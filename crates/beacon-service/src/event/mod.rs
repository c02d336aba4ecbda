//! Event record store.

pub mod store;

pub use store::EventStore;
