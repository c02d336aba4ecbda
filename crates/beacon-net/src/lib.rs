//! HTTP collaborators for Beacon.
//!
//! - [`HttpTransport`] posts event batches to the backend
//! - [`HttpMediaFetcher`] streams inbox media to disk

pub mod media;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use media::HttpMediaFetcher;
pub use transport::{APP_ID_HEADER, HttpTransport};
