pub mod auth;
pub mod error;
pub mod extract;
pub mod notify;
pub mod reports;
pub mod seed;
pub mod state;
pub mod users;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use serde_json::{Value, json};

pub use state::{AppState, DEFAULT_MAX_BODY_BYTES, Settings};

/// All API routes. CORS and tracing layers are added by the server binary.
pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.settings.max_body_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/fcm-token", post(users::update_push_token))
        .route("/users/{id}/reset-password", post(users::reset_password))
        .route(
            "/reports",
            get(reports::list_reports)
                .post(reports::create_report)
                .layer(body_limit),
        )
        .route("/reports/{id}", get(reports::get_report))
        .route("/reports/{id}/status", put(reports::update_status))
        .route("/reports/{id}/assign", put(reports::assign_report))
        .route("/reports/{id}/comments", post(reports::add_comment))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
