use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use rand_core::OsRng;
use regex::Regex;
use tracing::{error, info};
use uuid::Uuid;

use chatty_moderation::ContentKind;
use chatty_types::api::{
    AuthResponse, LoginRequest, SignupRequest, StatusResponse, UpdateProfileRequest,
};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::{AuthUser, create_token, expired_session_cookie, session_cookie};
use crate::state::{AppState, db_call};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

const MIN_PASSWORD_CHARS: usize = 6;
const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let full_name = req.full_name.trim().to_string();

    if email.is_empty() || full_name.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email format"));
    }
    let name_chars = full_name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_chars) {
        return Err(ApiError::validation(
            "Full name must be between 2 and 50 characters",
        ));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::validation(
            "Password must be at least 6 characters long",
        ));
    }

    let lookup = email.clone();
    if db_call(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::validation("User already exists"));
    }

    state
        .moderation
        .evaluate_text(&full_name, ContentKind::DisplayName)
        .await
        .ensure_allowed("Inappropriate name")?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4().to_string();
    let (id, mail, name) = (user_id.clone(), email.clone(), full_name.clone());
    let created = db_call(&state, move |db| {
        match db.create_user(&id, &mail, &name, &password_hash) {
            Ok(row) => Ok(Some(row)),
            // Lost a race with a concurrent signup for the same address.
            Err(e) if e.is::<chatty_db::DuplicateEmail>() => Ok(None),
            Err(e) => Err(e),
        }
    })
    .await?
    .ok_or_else(|| ApiError::validation("User already exists"))?;

    let token = create_token(&state.jwt_secret, &user_id)?;
    info!(user_id = %user_id, "User signed up");

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token, state.production)),
        Json(AuthResponse {
            message: "User created successfully".into(),
            user: created.into_profile(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }

    let user = db_call(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::validation("Invalid credentials"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!(user_id = %user.id, "Stored password hash is unreadable: {}", e);
        ApiError::Internal(anyhow::anyhow!("corrupt password hash"))
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::validation("Invalid credentials"))?;

    let token = create_token(&state.jwt_secret, &user.id)?;
    info!(user_id = %user.id, "User logged in");

    Ok((
        jar.add(session_cookie(token, state.production)),
        Json(AuthResponse {
            message: "Login successful".into(),
            user: user.into_profile(),
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(expired_session_cookie()),
        Json(StatusResponse {
            message: "Logout successful".into(),
        }),
    )
}

/// Replace the avatar. The picture goes through the same pipeline as message
/// images, so it is size checked, moderated and recompressed before upload.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile_pic = req
        .profile_pic
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Profile picture is required"))?;

    let prepared = state.images.prepare_image(&profile_pic, "avatars").await?;

    let user_id = user.id.clone();
    let url = prepared.url;
    let updated = db_call(&state, move |db| db.update_profile_pic(&user_id, &url))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized - User not found"))?;

    info!(user_id = %user.id, compressed = prepared.compressed, "Profile picture updated");

    Ok(Json(AuthResponse {
        message: "Profile updated successfully".into(),
        user: updated.into_profile(),
    }))
}

pub async fn check(Extension(AuthUser(user)): Extension<AuthUser>) -> impl IntoResponse {
    Json(AuthResponse {
        message: "User authenticated".into(),
        user,
    })
}
