use std::collections::BTreeMap;

use serde::Serialize;

use triage_types::events::ReportEvent;
use triage_types::models::Report;

/// A titled push message with a small string-to-string data payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn for_event(event: &ReportEvent, report: &Report) -> Self {
        let (title, body) = match event {
            ReportEvent::Created => (
                format!("New {} severity report", report.severity),
                format!(
                    "{} reported an issue in {}",
                    report.reporter_name.as_deref().unwrap_or("Someone"),
                    report.app
                ),
            ),
            ReportEvent::StatusChanged { status } => (
                "Report status updated".to_string(),
                format!("Your report for {} is now {}", report.app, status),
            ),
            ReportEvent::Assigned => (
                "Report assigned to you".to_string(),
                format!("You were assigned a {} severity report in {}", report.severity, report.app),
            ),
            ReportEvent::Commented { author_name, .. } => (
                format!("New comment from {}", author_name),
                format!("On the {} report", report.app),
            ),
        };

        let mut data = BTreeMap::new();
        data.insert("reportId".to_string(), report.id.clone());
        data.insert("type".to_string(), event.kind().to_string());
        if let ReportEvent::StatusChanged { status } = event {
            data.insert("status".to_string(), status.to_string());
        }

        Self { title, body, data }
    }
}
