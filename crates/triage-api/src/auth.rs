use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use axum::{Json, extract::State};
use anyhow::anyhow;
use tracing::error;

use triage_types::api::LoginRequest;
use triage_types::models::UserProfile;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::{AppState, blocking};

/// Verified against when the username is unknown, so both failure paths
/// cost one Argon2 verification.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("triage-unknown-user").unwrap_or_else(|e| {
        error!("Failed to build dummy password hash: {:#}", e);
        String::new()
    })
});

/// POST /auth/login — verify credentials and return the public profile.
/// No session or token is issued.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let username = req.username.clone();
    let user = state
        .db(move |db| db.get_user_by_username(&username))
        .await?;

    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let valid = blocking(move || check_credentials(stored.as_deref(), &req.password)).await?;

    match user {
        Some(user) if valid => Ok(Json(user.into_profile()?)),
        _ => Err(ApiError::Unauthorized),
    }
}

/// True only for a known user whose password verifies. An unknown user
/// (`stored_hash` is None) still pays for a verification.
pub fn check_credentials(stored_hash: Option<&str>, password: &str) -> anyhow::Result<bool> {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            let _ = verify_password(password, &DUMMY_HASH);
            Ok(false)
        }
    }
}

/// Hash with Argon2id and a fresh random salt. Returns a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("hashing password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Ok(false) on a wrong password; Err only if the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
