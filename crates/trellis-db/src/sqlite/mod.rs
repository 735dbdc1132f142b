pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};
use serde_json::Value;

use trellis_core::assignment::Assignment;
use trellis_core::attachment::{Attachment, NewAttachment};
use trellis_core::job::{JobRecord, JobStatus};
use trellis_core::project::{CreateProject, Project, UpdateProject};
use trellis_core::todo::{CreateTodo, Todo, TodoFilter, TodoPatch};
use trellis_core::user::{NewUser, Session, User, UserPatch};

use crate::{Database, DbConfig, DbError, Scope};

/// `.to_db()?` maps a rusqlite error into [`DbError`] inside the query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

/// Like [`SqliteResultExt::to_db`], but an empty result becomes `NotFound(what)`.
pub(crate) trait NotFoundExt<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, DbError>;
}

impl<T> NotFoundExt<T> for rusqlite::Result<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, DbError> {
        self.map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what()),
            other => map_sqlite_err(other),
        })
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("trellis.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    /// Run a `*_sync` query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Unique violations become `Conflict`, dangling references `NotFound`,
/// everything else `Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
        if err.code == ErrorCode::ConstraintViolation {
            let detail = msg.clone().unwrap_or_else(|| err.to_string());
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return DbError::Conflict(detail)
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return DbError::NotFound(detail)
                }
                _ => {}
            }
        }
    }
    DbError::Internal(e.to_string())
}


#[async_trait]
impl Database for SqliteDatabase {
    // -- Projects --
    async fn create_project(
        &self,
        owner_id: &str,
        input: &CreateProject,
    ) -> Result<Project, DbError> {
        let owner_id = owner_id.to_string();
        let input = input.clone();
        self.blocking(move |db| db.create_project_sync(&owner_id, &input))
            .await
    }
    async fn get_project(&self, scope: &Scope, id: i64) -> Result<Project, DbError> {
        let scope = scope.clone();
        self.blocking(move |db| db.get_project_sync(&scope, id)).await
    }
    async fn list_projects(&self, scope: &Scope) -> Result<Vec<Project>, DbError> {
        let scope = scope.clone();
        self.blocking(move |db| db.list_projects_sync(&scope)).await
    }
    async fn update_project(&self, update: &UpdateProject) -> Result<Project, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_project_sync(&update)).await
    }
    async fn delete_project(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_project_sync(id)).await
    }

    // -- Todos --
    async fn create_todo(&self, owner_id: &str, input: &CreateTodo) -> Result<Todo, DbError> {
        let owner_id = owner_id.to_string();
        let input = input.clone();
        self.blocking(move |db| db.create_todo_sync(&owner_id, &input))
            .await
    }
    async fn get_todo(&self, scope: &Scope, id: i64) -> Result<Todo, DbError> {
        let scope = scope.clone();
        self.blocking(move |db| db.get_todo_sync(&scope, id)).await
    }
    async fn list_todos(&self, scope: &Scope, filter: &TodoFilter) -> Result<Vec<Todo>, DbError> {
        let scope = scope.clone();
        let filter = filter.clone();
        self.blocking(move |db| db.list_todos_sync(&scope, &filter))
            .await
    }
    async fn update_todo(&self, id: i64, patch: &TodoPatch) -> Result<Todo, DbError> {
        let patch = patch.clone();
        self.blocking(move |db| db.update_todo_sync(id, &patch)).await
    }
    async fn delete_todo(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_todo_sync(id)).await
    }

    // -- Attachments --
    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_attachment_sync(&input)).await
    }
    async fn get_attachment(&self, id: i64) -> Result<Attachment, DbError> {
        self.blocking(move |db| db.get_attachment_sync(id)).await
    }
    async fn list_attachments(&self, todo_id: i64) -> Result<Vec<Attachment>, DbError> {
        self.blocking(move |db| db.list_attachments_sync(todo_id)).await
    }
    async fn list_project_attachments(
        &self,
        project_id: i64,
    ) -> Result<Vec<Attachment>, DbError> {
        self.blocking(move |db| db.list_project_attachments_sync(project_id))
            .await
    }
    async fn set_attachment_thumbnail(&self, id: i64, path: &str) -> Result<(), DbError> {
        let path = path.to_string();
        self.blocking(move |db| db.set_attachment_thumbnail_sync(id, &path))
            .await
    }
    async fn delete_attachment(&self, id: i64) -> Result<Attachment, DbError> {
        self.blocking(move |db| db.delete_attachment_sync(id)).await
    }

    // -- Assignments --
    async fn create_assignment(
        &self,
        todo_id: i64,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<Assignment, DbError> {
        let user_id = user_id.to_string();
        let assigned_by = assigned_by.to_string();
        self.blocking(move |db| db.create_assignment_sync(todo_id, &user_id, &assigned_by))
            .await
    }
    async fn delete_assignment(&self, todo_id: i64, user_id: &str) -> Result<(), DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.delete_assignment_sync(todo_id, &user_id))
            .await
    }
    async fn list_assignees(&self, todo_id: i64) -> Result<Vec<User>, DbError> {
        self.blocking(move |db| db.list_assignees_sync(todo_id)).await
    }

    // -- Users --
    async fn create_user(&self, input: &NewUser) -> Result<User, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_user_sync(&input)).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_user_sync(&id)).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let email = email.to_string();
        self.blocking(move |db| db.find_user_by_email_sync(&email))
            .await
    }
    async fn list_users(&self) -> Result<Vec<User>, DbError> {
        self.blocking(|db| db.list_users_sync()).await
    }
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, DbError> {
        let id = id.to_string();
        let patch = patch.clone();
        self.blocking(move |db| db.update_user_sync(&id, &patch)).await
    }
    async fn delete_user(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_user_sync(&id)).await
    }

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        let user_id = user_id.to_string();
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.create_session_sync(&user_id, &token_hash, expires_at))
            .await
    }
    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.find_session_user_sync(&token_hash, now))
            .await
    }
    async fn delete_session(&self, token_hash: &str) -> Result<(), DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.delete_session_sync(&token_hash))
            .await
    }
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        self.blocking(move |db| db.purge_expired_sessions_sync(now))
            .await
    }

    // -- Jobs --
    async fn enqueue_job(&self, kind: &str, payload: &Value) -> Result<JobRecord, DbError> {
        let kind = kind.to_string();
        let payload = payload.clone();
        self.blocking(move |db| db.enqueue_job_sync(&kind, &payload))
            .await
    }
    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, DbError> {
        self.blocking(move |db| db.claim_next_job_sync(now)).await
    }
    async fn complete_job(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.complete_job_sync(id)).await
    }
    async fn fail_job(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRecord, DbError> {
        let error = error.to_string();
        self.blocking(move |db| db.fail_job_sync(id, &error, retry_at))
            .await
    }
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>, DbError> {
        self.blocking(move |db| db.list_jobs_sync(status)).await
    }
    async fn requeue_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<usize, DbError> {
        self.blocking(move |db| db.requeue_stale_jobs_sync(older_than))
            .await
    }
}
