//! User identity and consent entities.

pub mod model;

pub use model::{IdentityState, OptChannel, keys};
