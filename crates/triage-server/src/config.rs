use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use triage_api::DEFAULT_MAX_BODY_BYTES;
use triage_api::seed::SeedAccount;
use triage_push::fcm::DEFAULT_ENDPOINT;
use triage_push::{FcmConfig, ServiceAccount};

/// Default passwords that should never survive into a real deployment.
pub const PLACEHOLDER_PASSWORDS: &[&str] = &["developer", "password123"];

const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    /// None disables push delivery.
    pub fcm: Option<FcmConfig>,
    pub seed: SeedAccount,
    pub reset_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let fcm = match lookup("TRIAGE_FCM_CREDENTIALS").filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(FcmConfig {
                endpoint: var("TRIAGE_FCM_ENDPOINT", DEFAULT_ENDPOINT),
                account: ServiceAccount::from_file(Path::new(path.trim()))
                    .context("TRIAGE_FCM_CREDENTIALS")?,
                timeout: Duration::from_secs(parse(&lookup, "TRIAGE_FCM_TIMEOUT_SECS", 10)?),
            }),
            None => None,
        };

        Ok(Self {
            host: var("TRIAGE_HOST", "0.0.0.0"),
            port: parse(&lookup, "TRIAGE_PORT", 3000)?,
            db_path: var("TRIAGE_DB_PATH", "triage.db").into(),
            allowed_origins: var("TRIAGE_ALLOWED_ORIGINS", DEFAULT_ORIGINS)
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            max_body_bytes: parse(&lookup, "TRIAGE_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            fcm,
            seed: SeedAccount {
                name: var("TRIAGE_SEED_NAME", "Default Developer"),
                username: var("TRIAGE_SEED_USERNAME", "developer"),
                password: var("TRIAGE_SEED_PASSWORD", "developer"),
            },
            reset_password: var("TRIAGE_RESET_PASSWORD", "password123"),
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
