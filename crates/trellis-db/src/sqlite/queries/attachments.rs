use chrono::Utc;
use rusqlite::{params, Row};

use trellis_core::attachment::{Attachment, NewAttachment};

use super::super::{NotFoundExt, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        todo_id: row.get("todo_id")?,
        uploader_id: row.get("uploader_id")?,
        filename: row.get("filename")?,
        stored_path: row.get("stored_path")?,
        mime_type: row.get("mime_type")?,
        size_bytes: row.get("size_bytes")?,
        thumbnail_path: row.get("thumbnail_path")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_attachment_sync(&self, input: &NewAttachment) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO attachments (todo_id, uploader_id, filename, stored_path, mime_type, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING *",
                params![
                    input.todo_id,
                    input.uploader_id,
                    input.filename,
                    input.stored_path,
                    input.mime_type,
                    input.size_bytes,
                    Utc::now(),
                ],
                row_to_attachment,
            )
            .to_db()
        })
    }

    pub fn list_attachments_sync(&self, todo_id: i64) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM attachments WHERE todo_id = ?1 ORDER BY created_at DESC, id DESC")
                .to_db()?;
            let attachments = stmt
                .query_map(params![todo_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn list_project_attachments_sync(&self, project_id: i64) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT a.* FROM attachments a
                     JOIN todos t ON t.id = a.todo_id
                     WHERE t.project_id = ?1
                     ORDER BY a.id",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![project_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn get_attachment_sync(&self, id: i64) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .or_not_found(|| format!("attachment {id}"))
        })
    }

    pub fn set_attachment_thumbnail_sync(&self, id: i64, path: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE attachments SET thumbnail_path = ?1 WHERE id = ?2",
                    params![path, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            Ok(())
        })
    }

    pub fn delete_attachment_sync(&self, id: i64) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "DELETE FROM attachments WHERE id = ?1 RETURNING *",
                params![id],
                row_to_attachment,
            )
            .or_not_found(|| format!("attachment {id}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::project::CreateProject;
    use trellis_core::todo::{CreateTodo, Priority};

    use super::*;

    fn setup() -> (SqliteDatabase, i64, i64) {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let project = db
            .create_project_sync(
                "u1",
                &CreateProject {
                    name: "P".into(),
                    description: None,
                    color: Default::default(),
                },
            )
            .unwrap();
        let todo = db
            .create_todo_sync(
                "u1",
                &CreateTodo {
                    project_id: project.id,
                    title: "T".into(),
                    description: None,
                    priority: Priority::Low,
                    due_date: None,
                },
            )
            .unwrap();
        (db, project.id, todo.id)
    }

    fn upload(todo_id: i64, name: &str, mime: &str) -> NewAttachment {
        NewAttachment {
            todo_id,
            uploader_id: "u1".into(),
            filename: name.into(),
            stored_path: format!("uploads/1-x-{name}"),
            mime_type: mime.into(),
            size_bytes: 3,
        }
    }

    #[test]
    fn attachment_lifecycle() {
        let (db, _, todo_id) = setup();
        let a = db.create_attachment_sync(&upload(todo_id, "cat.png", "image/png")).unwrap();
        assert_eq!(a.thumbnail_path, None);
        assert!(a.is_image());

        db.set_attachment_thumbnail_sync(a.id, "uploads/thumb-1-x-cat.png").unwrap();
        let fetched = db.get_attachment_sync(a.id).unwrap();
        assert_eq!(fetched.thumbnail_path.as_deref(), Some("uploads/thumb-1-x-cat.png"));

        let deleted = db.delete_attachment_sync(a.id).unwrap();
        assert_eq!(deleted.stored_path, "uploads/1-x-cat.png");
        assert!(db.list_attachments_sync(todo_id).unwrap().is_empty());
        assert!(matches!(
            db.delete_attachment_sync(a.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn listed_per_project_and_cascaded() {
        let (db, pid, todo_id) = setup();
        db.create_attachment_sync(&upload(todo_id, "a.txt", "text/plain")).unwrap();
        db.create_attachment_sync(&upload(todo_id, "b.txt", "text/plain")).unwrap();
        assert_eq!(db.list_project_attachments_sync(pid).unwrap().len(), 2);

        db.delete_project_sync(pid).unwrap();
        assert!(db.list_attachments_sync(todo_id).unwrap().is_empty());
    }

    #[test]
    fn thumbnail_for_missing_attachment() {
        let (db, _, _) = setup();
        assert!(matches!(
            db.set_attachment_thumbnail_sync(77, "x"),
            Err(DbError::NotFound(_))
        ));
    }
}
