//! Database row types. These map directly to SQLite rows and stay distinct
//! from the triage-types API models, which never carry credentials.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use triage_types::models::{Comment, Report, UserProfile};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub push_token: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            role: self
                .role
                .parse()
                .with_context(|| format!("user {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            name: self.name,
            username: self.username,
        })
    }
}

pub struct ReportRow {
    pub id: String,
    pub reporter_id: Option<String>,
    pub reporter_name: Option<String>,
    pub app: String,
    pub page: Option<String>,
    pub url: Option<String>,
    pub description: String,
    /// JSON array of screenshot payloads.
    pub screenshots: String,
    pub severity: String,
    pub status: String,
    pub assigned_to_id: Option<String>,
    pub assigned_to_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ReportRow {
    pub fn into_report(self, comments: Vec<Comment>) -> Result<Report> {
        let ctx = || format!("report {}", self.id);
        Ok(Report {
            screenshots: serde_json::from_str(&self.screenshots).with_context(ctx)?,
            severity: self.severity.parse().with_context(ctx)?,
            status: self.status.parse().with_context(ctx)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            reporter_id: self.reporter_id,
            reporter_name: self.reporter_name,
            app: self.app,
            page: self.page,
            url: self.url,
            description: self.description,
            assigned_to_id: self.assigned_to_id,
            assigned_to_name: self.assigned_to_name,
            comments,
        })
    }
}

pub struct CommentRow {
    pub id: String,
    pub report_id: String,
    pub author_id: String,
    pub author_name: String,
    pub message: String,
    pub created_at: String,
}

impl CommentRow {
    pub fn into_comment(self) -> Result<Comment> {
        Ok(Comment {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            author_id: self.author_id,
            author_name: self.author_name,
            message: self.message,
        })
    }
}

/// Current time at storage precision (microseconds), so a value handed back
/// to a client compares equal to the same value read back later.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexical order in SQLite matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(parsed.with_timezone(&Utc))
}
