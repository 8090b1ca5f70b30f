use std::collections::BTreeSet;

use triage_types::events::ReportEvent;
use triage_types::models::Report;

/// Who should hear about an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every user with the developer role.
    Developers,
    /// Specific user ids. May be empty.
    Users(BTreeSet<String>),
}

/// Map an event on `report` to its audience. Touches neither the store nor
/// the transport.
pub fn select_recipients(event: &ReportEvent, report: &Report) -> Audience {
    let mut users = BTreeSet::new();

    match event {
        ReportEvent::Created => return Audience::Developers,
        ReportEvent::StatusChanged { .. } => {
            users.extend(report.reporter_id.clone());
        }
        ReportEvent::Assigned => {
            users.extend(report.assigned_to_id.clone());
        }
        ReportEvent::Commented { author_id, .. } => {
            users.extend(report.reporter_id.clone());
            users.extend(report.assigned_to_id.clone());
            users.remove(author_id);
        }
    }

    Audience::Users(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use triage_types::models::{ReportStatus, Severity};

    fn report(reporter: Option<&str>, assignee: Option<&str>) -> Report {
        Report {
            id: "r1".into(),
            reporter_id: reporter.map(str::to_string),
            reporter_name: reporter.map(str::to_string),
            app: "X".into(),
            page: None,
            url: None,
            description: String::new(),
            screenshots: vec![],
            severity: Severity::Low,
            status: ReportStatus::Open,
            assigned_to_id: assignee.map(str::to_string),
            assigned_to_name: assignee.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            comments: vec![],
        }
    }

    fn users(ids: &[&str]) -> Audience {
        Audience::Users(ids.iter().map(|s| s.to_string()).collect())
    }

    fn commented_by(author: &str) -> ReportEvent {
        ReportEvent::Commented {
            author_id: author.into(),
            author_name: author.into(),
        }
    }

    #[test]
    fn new_report_goes_to_developers() {
        let r = report(Some("rep"), None);
        assert_eq!(select_recipients(&ReportEvent::Created, &r), Audience::Developers);
    }

    #[test]
    fn status_change_goes_to_reporter() {
        let event = ReportEvent::StatusChanged {
            status: ReportStatus::Resolved,
        };
        assert_eq!(select_recipients(&event, &report(Some("rep"), Some("dev"))), users(&["rep"]));
        assert_eq!(select_recipients(&event, &report(None, Some("dev"))), users(&[]));
    }

    #[test]
    fn assignment_goes_to_assignee() {
        let event = ReportEvent::Assigned;
        assert_eq!(select_recipients(&event, &report(Some("rep"), Some("dev"))), users(&["dev"]));
        assert_eq!(select_recipients(&event, &report(Some("rep"), None)), users(&[]));
    }

    #[test]
    fn reporter_comment_goes_to_assignee() {
        let r = report(Some("rep"), Some("dev"));
        assert_eq!(select_recipients(&commented_by("rep"), &r), users(&["dev"]));
    }

    #[test]
    fn assignee_comment_goes_to_reporter() {
        let r = report(Some("rep"), Some("dev"));
        assert_eq!(select_recipients(&commented_by("dev"), &r), users(&["rep"]));
    }

    #[test]
    fn third_party_comment_goes_to_both() {
        let r = report(Some("rep"), Some("dev"));
        assert_eq!(select_recipients(&commented_by("lead"), &r), users(&["dev", "rep"]));
    }

    #[test]
    fn comment_on_unassigned_report_by_reporter_notifies_nobody() {
        let r = report(Some("rep"), None);
        assert_eq!(select_recipients(&commented_by("rep"), &r), users(&[]));
    }

    #[test]
    fn self_assigned_reporter_is_notified_once() {
        let r = report(Some("rep"), Some("rep"));
        assert_eq!(select_recipients(&commented_by("lead"), &r), users(&["rep"]));
        assert_eq!(select_recipients(&commented_by("rep"), &r), users(&[]));
    }
}
