//! Repository implementations for all Beacon entities.

pub mod event;
pub mod inbox;
pub mod preference;

pub use event::EventRepository;
pub use inbox::InboxRepository;
pub use preference::{PreferenceChange, PreferenceRepository};
