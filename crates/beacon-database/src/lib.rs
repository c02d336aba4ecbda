//! # beacon-database
//!
//! SQLite connection management, embedded migrations, and the repositories
//! behind the event queue, the app inbox, and the preference set.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
