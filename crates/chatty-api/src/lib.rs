pub mod auth;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, AppStateInner};
