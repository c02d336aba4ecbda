//! App inbox entities.

pub mod model;
pub mod payload;
pub mod status;

pub use model::{InboxMessage, InboxRecord};
pub use payload::{CarouselItem, MediaKind, MediaReference, MediaSlot, NotificationPayload};
pub use status::{InboxFilter, InboxStatus, StatusUpdate};
