pub mod connection;
pub mod presence;

pub use presence::{ConnectionId, Delivery, PresenceRegistry};
