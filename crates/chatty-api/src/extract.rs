use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections come back as `ApiError`, so a bad body gets
/// the usual `{"message"}` response.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
