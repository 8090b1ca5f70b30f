use std::sync::Arc;

use tracing::error;

use triage_db::Database;
use triage_push::Notifier;

use crate::error::ApiError;

/// Reports carry base64 screenshots, so the body limit sits well above
/// axum's 2 MB default.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Knobs that handlers need at request time.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Password applied by `POST /users/{id}/reset-password`.
    pub reset_password: String,
    /// Largest accepted `POST /reports` body.
    pub max_body_bytes: usize,
}

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, settings: Settings) -> Self {
        Self {
            db: Arc::new(db),
            notifier,
            settings: Arc::new(settings),
        }
    }

    /// Run a blocking DB call off the async runtime.
    pub async fn db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        blocking(move || f(&db)).await
    }
}

/// Run CPU-bound or blocking work (DB calls, password hashing) on the
/// blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
