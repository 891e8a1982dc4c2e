use std::sync::Arc;

use tracing::error;

use chatty_db::Database;
use chatty_gateway::PresenceRegistry;
use chatty_media::ImagePipeline;
use chatty_moderation::ModerationGate;

use crate::error::ApiError;
use crate::rate_limit::RateLimits;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Secure cookies and rate limits are on in production only.
    pub production: bool,
    /// Take the client address from `X-Forwarded-For` (behind a reverse proxy).
    pub trust_proxy: bool,
    pub presence: PresenceRegistry,
    pub moderation: ModerationGate,
    pub images: ImagePipeline,
    pub limits: RateLimits,
}

/// Run a blocking DB call off the async runtime.
pub async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}
