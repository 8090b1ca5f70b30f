use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, reports, comments)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('developer', 'user')),
                push_token      TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_users_role ON users(role);

            CREATE TABLE reports (
                id                  TEXT PRIMARY KEY,
                reporter_id         TEXT,
                reporter_name       TEXT,
                app                 TEXT NOT NULL,
                page                TEXT,
                url                 TEXT,
                description         TEXT NOT NULL DEFAULT '',
                screenshots         TEXT NOT NULL DEFAULT '[]',
                severity            TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
                status              TEXT NOT NULL DEFAULT 'open'
                                    CHECK (status IN ('open', 'in_progress', 'resolved', 'closed')),
                assigned_to_id      TEXT,
                assigned_to_name    TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_reports_created ON reports(created_at);

            CREATE TABLE comments (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                report_id       TEXT NOT NULL REFERENCES reports(id),
                author_id       TEXT NOT NULL,
                author_name     TEXT NOT NULL,
                message         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_comments_report ON comments(report_id, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
