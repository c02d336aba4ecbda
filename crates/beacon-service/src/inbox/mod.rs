//! App inbox: message store, download progress, media downloads.

pub mod media;
pub mod progress;
pub mod store;

pub use media::{MediaDownloadService, MediaFetcher};
pub use progress::DownloadProgress;
pub use store::InboxStore;
