use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use chatty_types::api::{MessagePage, Pagination, SendMessageRequest};
use chatty_types::models::UserProfile;

use crate::delivery::submit_message;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::AuthUser;
use crate::state::{AppState, db_call};

const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

/// Everyone except the caller, for the conversation list.
pub async fn users_for_sidebar(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, move |db| db.list_users_except(&me.id)).await?;
    let users: Vec<UserProfile> = rows.into_iter().map(|r| r.into_profile()).collect();
    Ok(Json(users))
}

/// One page of the conversation with `peer_id`, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Query(query): Query<PageQuery>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = u64::from(page - 1) * u64::from(limit);

    let (total, rows) = db_call(&state, move |db| {
        if db.get_user_by_id(&peer_id)?.is_none() {
            return Ok(None);
        }
        let total = db.count_conversation(&me.id, &peer_id)?;
        let rows = db.get_conversation(&me.id, &peer_id, offset, limit)?;
        Ok(Some((total, rows)))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(MessagePage {
        messages: rows.into_iter().map(|r| r.into_message()).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if state.production {
        state.limits.send.check(&me.id)?;
    }

    let peer = peer_id.clone();
    if db_call(&state, move |db| db.get_user_by_id(&peer)).await?.is_none() {
        return Err(ApiError::NotFound("User not found".into()));
    }

    let submission = submit_message(&state, &me.id, &peer_id, req).await?;
    Ok(Json(submission.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults() {
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!((q.page, q.limit), (1, 50));
    }
}
