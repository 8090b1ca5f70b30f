//! Best-effort push notifications for report lifecycle events.
//!
//! Who gets notified is decided by [`recipients::select_recipients`], a pure
//! function over the event and the report. Delivery goes through a
//! [`Notifier`], and [`dispatch`] runs it detached from the request so
//! failures are logged and never surface to the caller.

pub mod fcm;
pub mod message;
pub mod recipients;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

pub use fcm::{FcmConfig, FcmNotifier, ServiceAccount};
pub use message::PushMessage;
pub use recipients::{Audience, select_recipients};

/// Delivers a push message to a set of device tokens.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> anyhow::Result<()>;
}

/// Used when no push credentials are configured: logs instead of delivering.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> anyhow::Result<()> {
        debug!(
            "Push disabled, dropping '{}' for {} device(s)",
            message.title,
            tokens.len()
        );
        Ok(())
    }
}

/// Fire-and-forget delivery. Returns immediately; the send runs on its own
/// task and any error is logged.
pub fn dispatch(notifier: Arc<dyn Notifier>, tokens: Vec<String>, message: PushMessage) {
    if tokens.is_empty() {
        debug!("No push tokens for '{}', skipping", message.title);
        return;
    }

    tokio::spawn(async move {
        if let Err(e) = notifier.send(&tokens, &message).await {
            warn!(
                "Push notification '{}' to {} device(s) failed: {:#}",
                message.title,
                tokens.len(),
                e
            );
        }
    });
}
