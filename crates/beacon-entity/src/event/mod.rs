//! Outbound event queue entities.

pub mod kind;
pub mod model;
pub mod status;

pub use kind::{EventCode, EventName, EventType};
pub use model::{EventPayload, EventRecord, NewEvent, RetryMetadata};
pub use status::EventStatus;
