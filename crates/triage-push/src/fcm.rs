use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::Notifier;
use crate::message::PushMessage;

pub const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the access token this long before Google says it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a Google service-account key file that FCM needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing service account JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading service account file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    /// Base URL of the FCM API, without the `/v1/...` path.
    pub endpoint: String,
    pub account: ServiceAccount,
    pub timeout: Duration,
}

/// Claims of the signed assertion exchanged for an OAuth2 access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Firebase Cloud Messaging over the HTTP v1 API.
///
/// Authenticates as a service account: a signed RS256 assertion is traded
/// for a short-lived bearer token, which is cached until shortly before it
/// expires. v1 addresses one device per request, so a send to several
/// tokens makes one request each.
pub struct FcmNotifier {
    client: reqwest::Client,
    config: FcmConfig,
    signing_key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
}

impl FcmNotifier {
    pub fn new(config: FcmConfig) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(config.account.private_key.as_bytes())
            .context("parsing service account private key")?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building FCM HTTP client")?;
        Ok(Self {
            client,
            config,
            signing_key,
            token: Mutex::new(None),
        })
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.config.endpoint.trim_end_matches('/'),
            self.config.account.project_id
        )
    }

    /// Signed JWT asserting the service account's identity to the token endpoint.
    pub fn assertion(&self) -> Result<String> {
        let account = &self.config.account;
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: account.client_email.clone(),
            scope: MESSAGING_SCOPE.to_string(),
            aud: account.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = account.private_key_id.clone();

        encode(&header, &claims, &self.signing_key).context("signing service account assertion")
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let token_uri = &self.config.account.token_uri;
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .with_context(|| format!("POST {}", token_uri))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token endpoint responded {}: {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("decoding access token response")?;
        debug!("Fetched FCM access token, valid for {}s", token.expires_in);

        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn send_one(&self, url: &str, access_token: &str, token: &str, message: &PushMessage) -> Result<()> {
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&build_payload(token, message))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.token.lock().await.take();
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("FCM responded {}: {}", status, body);
        }
        Ok(())
    }
}

/// v1 request body for a single device.
pub fn build_payload(token: &str, message: &PushMessage) -> Value {
    json!({
        "message": {
            "token": token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "android": { "priority": "high" },
            "apns": { "headers": { "apns-priority": "10" } },
        }
    })
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let access_token = self.access_token().await?;
        let url = self.messages_url();

        let mut failed = 0;
        let mut last_error = None;
        for token in tokens {
            if let Err(e) = self.send_one(&url, &access_token, token, message).await {
                warn!("FCM send of '{}' failed: {:#}", message.title, e);
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failed == tokens.len() => {
                Err(e.context(format!("FCM rejected all {} device(s)", tokens.len())))
            }
            Some(_) => {
                warn!(
                    "FCM delivered '{}' to {}/{} device(s)",
                    message.title,
                    tokens.len() - failed,
                    tokens.len()
                );
                Ok(())
            }
            None => {
                debug!("FCM delivered '{}' to {} device(s)", message.title, tokens.len());
                Ok(())
            }
        }
    }
}
