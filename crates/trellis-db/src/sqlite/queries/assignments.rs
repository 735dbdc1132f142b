use chrono::Utc;
use rusqlite::{params, Row};

use trellis_core::assignment::Assignment;
use trellis_core::user::User;

use super::super::{SqliteDatabase, SqliteResultExt};
use super::users::row_to_user;
use crate::DbError;

fn row_to_assignment(row: &Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get("id")?,
        todo_id: row.get("todo_id")?,
        user_id: row.get("user_id")?,
        assigned_by: row.get("assigned_by")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    /// Fails with `Conflict` when the user is already assigned.
    pub fn create_assignment_sync(
        &self,
        todo_id: i64,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<Assignment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO assignments (todo_id, user_id, assigned_by, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING *",
                params![todo_id, user_id, assigned_by, Utc::now()],
                row_to_assignment,
            )
            .to_db()
        })
    }

    pub fn delete_assignment_sync(&self, todo_id: i64, user_id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM assignments WHERE todo_id = ?1 AND user_id = ?2",
                    params![todo_id, user_id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!(
                    "assignment of {user_id} to todo {todo_id}"
                )));
            }
            Ok(())
        })
    }

    pub fn list_assignees_sync(&self, todo_id: i64) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT u.* FROM users u
                     JOIN assignments a ON a.user_id = u.id
                     WHERE a.todo_id = ?1
                     ORDER BY a.created_at, a.id",
                )
                .to_db()?;
            let users = stmt
                .query_map(params![todo_id], row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }
}
