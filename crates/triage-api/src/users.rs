use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, warn};
use uuid::Uuid;

use triage_db::models::{UserRow, format_timestamp, now};
use triage_db::is_unique_violation;
use triage_types::api::{CreateUserRequest, PushTokenRequest, SuccessResponse};
use triage_types::models::UserProfile;

use crate::auth::hash_password;
use crate::error::{ApiError, require};
use crate::extract::ApiJson;
use crate::state::{AppState, blocking};

const USERNAME_TAKEN: &str = "username already exists";

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let rows = state.db(|db| db.list_users()).await?;
    let profiles = rows
        .into_iter()
        .map(UserRow::into_profile)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(profiles))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    require(&[
        ("name", req.name.as_str()),
        ("username", req.username.as_str()),
        ("password", req.password.as_str()),
    ])?;

    let username = req.username.clone();
    if state
        .db(move |db| db.get_user_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(USERNAME_TAKEN.into()));
    }

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let row = UserRow {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        username: req.username,
        password_hash,
        role: req.role.as_str().to_string(),
        push_token: None,
        created_at: format_timestamp(&now()),
    };

    // A concurrent registration can still win the race past the check above
    let row = state
        .db(move |db| match db.insert_user(&row) {
            Ok(()) => Ok(Ok(row)),
            Err(e) if is_unique_violation(&e) => Ok(Err(ApiError::BadRequest(USERNAME_TAKEN.into()))),
            Err(e) => Err(e),
        })
        .await??;

    info!("Created {} account '{}'", row.role, row.username);
    Ok((StatusCode::CREATED, Json(row.into_profile()?)))
}

/// POST /users/{id}/reset-password — set the configured default password.
///
/// The request carries no proof of who is asking, so any caller can reset any
/// account. Every reset is logged so it at least leaves a trail.
pub async fn reset_password(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let password = state.settings.reset_password.clone();
    let password_hash = blocking(move || hash_password(&password)).await?;

    let uid = user_id.clone();
    let found = state
        .db(move |db| db.set_password_hash(&uid, &password_hash))
        .await?;
    if !found {
        return Err(ApiError::NotFound("user not found"));
    }

    warn!("Password for user {} was reset to the default", user_id);
    Ok(Json(SuccessResponse::ok()))
}

/// POST /users/fcm-token
pub async fn update_push_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PushTokenRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require(&[("userId", req.user_id.as_str()), ("token", req.token.as_str())])?;

    let found = state
        .db(move |db| db.set_push_token(&req.user_id, &req.token))
        .await?;
    if !found {
        return Err(ApiError::NotFound("user not found"));
    }

    Ok(Json(SuccessResponse::ok()))
}
