use axum::{
    Router,
    extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    middleware,
    response::Response,
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::warn;

use chatty_gateway::connection;

use crate::auth;
use crate::error::ApiError;
use crate::messages;
use crate::middleware::{decode_token, require_auth, session_token};
use crate::rate_limit::{limit_login, limit_signup};
use crate::state::AppState;

/// Base64 of a 10 MB image plus the JSON envelope.
pub const BODY_LIMIT_BYTES: usize = 15 * 1024 * 1024;

/// The API and realtime routes. CORS, tracing and static files are layered
/// on by the server.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(
            "/api/auth/signup",
            post(auth::signup).layer(middleware::from_fn_with_state(state.clone(), limit_signup)),
        )
        .route(
            "/api/auth/login",
            post(auth::login).layer(middleware::from_fn_with_state(state.clone(), limit_login)),
        )
        .route("/api/auth/logout", post(auth::logout))
        .route("/ws", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/api/auth/update-profile", put(auth::update_profile))
        .route("/api/auth/check", get(auth::check))
        .route("/api/messages/users", get(messages::users_for_sidebar))
        .route("/api/messages/{peer_id}", get(messages::get_messages))
        .route("/api/messages/send/{peer_id}", post(messages::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Resolve the user a realtime client connects as. A valid session cookie
/// is required; a `userId` in the query must name the same user.
pub fn authorize_realtime(
    state: &AppState,
    headers: &HeaderMap,
    user_id: Option<String>,
) -> Result<String, ApiError> {
    let token = session_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - No token provided"))?;
    let claims = decode_token(&state.jwt_secret, &token)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - Invalid token"))?;

    match user_id.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        Some(claimed) if claimed != claims.sub => {
            warn!(claimed = %claimed, session = %claims.sub, "Realtime identity mismatch");
            Err(ApiError::unauthorized("Unauthorized - Session does not match userId"))
        }
        _ => Ok(claims.sub),
    }
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = authorize_realtime(&state, &headers, query.user_id)?;
    let registry = state.presence.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, registry, user_id)))
}
