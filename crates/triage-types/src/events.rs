use crate::models::ReportStatus;

/// Report lifecycle events that may produce a push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// A new report was submitted.
    Created,

    /// The report moved to a new status.
    StatusChanged { status: ReportStatus },

    /// The report was (re)assigned.
    Assigned,

    /// A comment was appended by `author_id`.
    Commented { author_id: String, author_name: String },
}

impl ReportEvent {
    /// Stable event name carried in the notification payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created => "new_report",
            Self::StatusChanged { .. } => "status_changed",
            Self::Assigned => "assigned",
            Self::Commented { .. } => "comment",
        }
    }
}
