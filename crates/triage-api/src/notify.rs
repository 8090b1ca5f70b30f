use tracing::warn;

use triage_push::{Audience, PushMessage, dispatch, select_recipients};
use triage_types::events::ReportEvent;
use triage_types::models::{Report, Role};

use crate::state::AppState;

/// Resolve who hears about `event`, look up their device tokens and hand
/// the message to the notifier in the background. Never fails the caller.
pub async fn notify(state: &AppState, event: ReportEvent, report: &Report) {
    let tokens = match select_recipients(&event, report) {
        Audience::Developers => state.db(|db| db.push_tokens_for_role(Role::Developer)).await,
        Audience::Users(ids) if ids.is_empty() => return,
        Audience::Users(ids) => {
            let ids: Vec<String> = ids.into_iter().collect();
            state.db(move |db| db.push_tokens_for_users(&ids)).await
        }
    };

    match tokens {
        Ok(tokens) => dispatch(
            state.notifier.clone(),
            tokens,
            PushMessage::for_event(&event, report),
        ),
        Err(e) => warn!(
            "Skipping '{}' notification for report {}: token lookup failed: {}",
            event.kind(),
            report.id,
            e
        ),
    }
}
