use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections come back with the usual `{"error": ...}`
/// body. Bad syntax and missing fields are 400s.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
