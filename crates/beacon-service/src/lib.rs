//! # beacon-service
//!
//! The SDK core services: the event record store, identity and consent
//! management, the tracking facade, the app inbox with its media
//! downloads, and push/in-app notification intake.
//!
//! Services are constructed explicitly and shared through `Arc`; none of
//! them hold global state.

pub mod event;
pub mod identity;
pub mod inbox;
pub mod notification;
pub mod tracking;

#[cfg(test)]
pub(crate) mod test_support;

pub use event::EventStore;
pub use identity::IdentityManager;
pub use inbox::{InboxStore, MediaDownloadService, MediaFetcher};
pub use notification::NotificationService;
pub use tracking::Tracker;
