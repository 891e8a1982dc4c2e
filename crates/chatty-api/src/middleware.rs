use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use chatty_types::api::Claims;
use chatty_types::models::UserProfile;

use crate::error::ApiError;
use crate::state::{AppState, db_call};

pub const SESSION_COOKIE: &str = "jwt";
pub const SESSION_DAYS: i64 = 7;

/// The user behind the request's session, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserProfile);

pub fn create_token(secret: &str, user_id: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Session token from the request's cookies, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(token: String, production: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(production)
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Resolve the session cookie to a user, or reject with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - No token provided"))?;

    let claims = decode_token(&state.jwt_secret, &token)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - Invalid token"))?;

    let user = db_call(&state, move |db| db.get_user_by_id(&claims.sub))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - User not found"))?;

    req.extensions_mut().insert(AuthUser(user.into_profile()));
    Ok(next.run(req).await)
}
