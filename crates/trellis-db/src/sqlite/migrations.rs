use rusqlite::{params, Connection};

use super::SqliteResultExt;
use crate::DbError;

pub(crate) const LATEST: i64 = 2;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .to_db()?;

    if current_version < 1 {
        // v1: users, sessions, projects, todos, attachments, assignments.
        // owner/uploader columns are plain text so deleting a user leaves
        // their content in place for admins.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                roles         TEXT NOT NULL DEFAULT '[\"user\"]',
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash  TEXT NOT NULL UNIQUE,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS projects (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    TEXT NOT NULL,
                name        TEXT NOT NULL,
                description TEXT,
                color       TEXT NOT NULL DEFAULT 'blue'
                                CHECK(color IN ('blue','green','red','yellow','purple','gray')),
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);

            CREATE TABLE IF NOT EXISTS todos (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                owner_id    TEXT NOT NULL,
                title       TEXT NOT NULL,
                description TEXT,
                completed   INTEGER NOT NULL DEFAULT 0,
                priority    TEXT NOT NULL DEFAULT 'medium'
                                CHECK(priority IN ('low','medium','high')),
                due_date    TEXT,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_todos_project ON todos(project_id);

            CREATE TABLE IF NOT EXISTS attachments (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                todo_id        INTEGER NOT NULL REFERENCES todos(id) ON DELETE CASCADE,
                uploader_id    TEXT NOT NULL,
                filename       TEXT NOT NULL,
                stored_path    TEXT NOT NULL,
                mime_type      TEXT NOT NULL,
                size_bytes     INTEGER NOT NULL DEFAULT 0,
                thumbnail_path TEXT,
                created_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attachments_todo ON attachments(todo_id);

            CREATE TABLE IF NOT EXISTS assignments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                todo_id     INTEGER NOT NULL REFERENCES todos(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                assigned_by TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(todo_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_user ON assignments(user_id);
            ",
        )
        .to_db()?;
        mark(conn, 1)?;
    }

    if current_version < 2 {
        // v2: durable job queue polled by the worker
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS jobs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                kind        TEXT NOT NULL,
                payload     TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'queued'
                                CHECK(status IN ('queued','running','done','failed')),
                attempts    INTEGER NOT NULL DEFAULT 0,
                last_error  TEXT,
                run_at      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(status, run_at);
            ",
        )
        .to_db()?;
        mark(conn, 2)?;
    }

    Ok(())
}

fn mark(conn: &Connection, version: i64) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        params![version],
    )
    .to_db()?;
    Ok(())
}
