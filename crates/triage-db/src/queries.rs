use std::collections::HashMap;

use crate::Database;
use crate::models::{CommentRow, ReportRow, UserRow, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use triage_types::models::{Comment, Report, ReportStatus, Role};

const USER_COLUMNS: &str = "id, name, username, password_hash, role, push_token, created_at";

const REPORT_COLUMNS: &str = "id, reporter_id, reporter_name, app, page, url, description, \
     screenshots, severity, status, assigned_to_id, assigned_to_name, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn insert_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, password_hash, role, push_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.name,
                    user.username,
                    user.password_hash,
                    user.role,
                    user.push_token,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no user has this id.
    pub fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns false if no user has this id.
    pub fn set_push_token(&self, id: &str, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET push_token = ?1 WHERE id = ?2",
                params![token, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Push tokens of every user holding `role`. Users without a token are skipped.
    pub fn push_tokens_for_role(&self, role: Role) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT push_token FROM users
                 WHERE role = ?1 AND push_token IS NOT NULL AND push_token != ''
                 ORDER BY created_at ASC",
            )?;
            let tokens = stmt
                .query_map([role.as_str()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tokens)
        })
    }

    /// Push tokens for the given user ids. Unknown ids and users without a
    /// token are skipped.
    pub fn push_tokens_for_users(&self, user_ids: &[String]) -> Result<Vec<String>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT push_token FROM users
                 WHERE id IN ({}) AND push_token IS NOT NULL AND push_token != ''",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let tokens = stmt
                .query_map(rusqlite::params_from_iter(user_ids.iter()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tokens)
        })
    }

    // -- Reports --

    pub fn insert_report(&self, report: &Report) -> Result<()> {
        let screenshots = serde_json::to_string(&report.screenshots)?;
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO reports ({REPORT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    report.id,
                    report.reporter_id,
                    report.reporter_name,
                    report.app,
                    report.page,
                    report.url,
                    report.description,
                    screenshots,
                    report.severity.as_str(),
                    report.status.as_str(),
                    report.assigned_to_id,
                    report.assigned_to_name,
                    format_timestamp(&report.created_at),
                    format_timestamp(&report.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_report(&self, id: &str) -> Result<Option<Report>> {
        self.with_conn(|conn| query_report(conn, id))
    }

    /// All reports, newest first. Reports created in the same instant come
    /// back in reverse insertion order.
    pub fn list_reports(&self) -> Result<Vec<Report>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], report_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // One pass over all comments instead of a query per report
            let mut stmt = conn.prepare(
                "SELECT id, report_id, author_id, author_name, message, created_at
                 FROM comments ORDER BY seq ASC",
            )?;
            let comment_rows = stmt
                .query_map([], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut by_report: HashMap<String, Vec<Comment>> = HashMap::new();
            for row in comment_rows {
                let report_id = row.report_id.clone();
                by_report.entry(report_id).or_default().push(row.into_comment()?);
            }

            rows.into_iter()
                .map(|row| {
                    let comments = by_report.remove(&row.id).unwrap_or_default();
                    row.into_report(comments)
                })
                .collect()
        })
    }

    /// Returns the updated report, or None if it does not exist.
    pub fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Report>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reports SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), format_timestamp(&now), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_report(conn, id)
        })
    }

    /// Returns the updated report, or None if it does not exist.
    pub fn assign_report(
        &self,
        id: &str,
        assignee_id: &str,
        assignee_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Report>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reports SET assigned_to_id = ?1, assigned_to_name = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![assignee_id, assignee_name, format_timestamp(&now), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_report(conn, id)
        })
    }

    /// Append a comment and bump the report's `updated_at` in one
    /// transaction. Returns the updated report, or None if it does not exist.
    pub fn append_comment(&self, report_id: &str, comment: &Comment) -> Result<Option<Report>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE reports SET updated_at = ?1 WHERE id = ?2",
                params![format_timestamp(&comment.created_at), report_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (id, report_id, author_id, author_name, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.id,
                    report_id,
                    comment.author_id,
                    comment.author_name,
                    comment.message,
                    format_timestamp(&comment.created_at),
                ],
            )?;

            let report = query_report(&tx, report_id)?;
            tx.commit()?;
            Ok(report)
        })
    }
}

/// True if `err` came from a UNIQUE constraint violation in SQLite.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn query_report(conn: &Connection, id: &str) -> Result<Option<Report>> {
    let mut stmt = conn.prepare(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"))?;
    let Some(row) = stmt.query_row([id], report_from_row).optional()? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, report_id, author_id, author_name, message, created_at
         FROM comments WHERE report_id = ?1 ORDER BY seq ASC",
    )?;
    let comments = stmt
        .query_map([id], comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(CommentRow::into_comment)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(row.into_report(comments)?))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        push_token: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        reporter_name: row.get(2)?,
        app: row.get(3)?,
        page: row.get(4)?,
        url: row.get(5)?,
        description: row.get(6)?,
        screenshots: row.get(7)?,
        severity: row.get(8)?,
        status: row.get(9)?,
        assigned_to_id: row.get(10)?,
        assigned_to_name: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        report_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
