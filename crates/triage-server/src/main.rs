mod config;
mod cors;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use triage_api::seed::ensure_seed_account;
use triage_api::{AppState, Settings};
use triage_db::Database;
use triage_push::{FcmNotifier, LogNotifier, Notifier};

use crate::config::{Config, PLACEHOLDER_PASSWORDS};
use crate::cors::cors_layer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "triage_server=debug,triage_api=debug,triage_db=info,triage_push=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and make sure someone can log in
    let db = Database::open(&config.db_path)?;
    if PLACEHOLDER_PASSWORDS.contains(&config.seed.password.as_str()) {
        warn!("TRIAGE_SEED_PASSWORD is unset or a placeholder; change it before exposing this server");
    }
    ensure_seed_account(&db, &config.seed).context("seeding developer account")?;

    let notifier: Arc<dyn Notifier> = match &config.fcm {
        Some(fcm) => {
            info!(
                "Push notifications via {} for project {}",
                fcm.endpoint, fcm.account.project_id
            );
            Arc::new(FcmNotifier::new(fcm.clone())?)
        }
        None => {
            warn!("TRIAGE_FCM_CREDENTIALS not set; push notifications are disabled");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(
        db,
        notifier,
        Settings {
            reset_password: config.reset_password.clone(),
            max_body_bytes: config.max_body_bytes,
        },
    );

    let cors = cors_layer(&config.allowed_origins)?;
    info!("CORS origins: {}", config.allowed_origins.join(", "));

    let app = triage_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = bind(&config.host, config.port).await?;
    info!("Triage server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Accepts hostnames and bare IPv6 literals as well as IPv4 addresses.
async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding {}:{}", host, port))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_by_hostname() {
        let listener = bind("localhost", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn unresolvable_host_is_reported() {
        let err = bind("no-such-host.invalid", 0).await.unwrap_err();
        assert!(err.to_string().contains("no-such-host.invalid"));
    }
}
