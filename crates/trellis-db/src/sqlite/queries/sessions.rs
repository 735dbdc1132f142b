use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use trellis_core::user::{Session, User};

use super::super::{SqliteDatabase, SqliteResultExt};
use super::users::row_to_user;
use crate::DbError;

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        token_hash: row.get("token_hash")?,
        expires_at: row.get("expires_at")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_session_sync(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.query_row(
                "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING *",
                params![id, user_id, token_hash, expires_at, Utc::now()],
                row_to_session,
            )
            .to_db()
        })
    }

    /// The user behind an unexpired session, if any.
    pub fn find_session_user_sync(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.* FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![token_hash, now],
                row_to_user,
            )
            .optional()
            .to_db()
        })
    }

    pub fn delete_session_sync(&self, token_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn purge_expired_sessions_sync(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
                .to_db()
        })
    }
}
