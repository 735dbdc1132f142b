pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use trellis_core::assignment::Assignment;
use trellis_core::attachment::{Attachment, NewAttachment};
use trellis_core::job::{JobRecord, JobStatus};
use trellis_core::project::{CreateProject, Project, UpdateProject};
use trellis_core::todo::{CreateTodo, Todo, TodoFilter, TodoPatch};
use trellis_core::user::{Actor, NewUser, Session, User, UserPatch};

pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub sqlite_path: Option<String>,
}

/// Row visibility for reads. Admins see everything; everyone else sees the
/// projects they own plus todos in those projects or assigned to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    User(String),
}

impl Scope {
    pub(crate) fn user_id(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::User(id) => Some(id),
        }
    }
}

impl From<&Actor> for Scope {
    fn from(actor: &Actor) -> Self {
        if actor.is_admin() {
            Scope::All
        } else {
            Scope::User(actor.user_id.clone())
        }
    }
}

/// `$XDG_DATA_HOME/trellis`, falling back to `~/.local/share/trellis`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("trellis")
}

#[async_trait]
pub trait Database: Send + Sync {
    // -- Projects --
    async fn create_project(&self, owner_id: &str, input: &CreateProject)
        -> Result<Project, DbError>;
    async fn get_project(&self, scope: &Scope, id: i64) -> Result<Project, DbError>;
    async fn list_projects(&self, scope: &Scope) -> Result<Vec<Project>, DbError>;
    async fn update_project(&self, update: &UpdateProject) -> Result<Project, DbError>;
    async fn delete_project(&self, id: i64) -> Result<(), DbError>;

    // -- Todos --
    async fn create_todo(&self, owner_id: &str, input: &CreateTodo) -> Result<Todo, DbError>;
    async fn get_todo(&self, scope: &Scope, id: i64) -> Result<Todo, DbError>;
    async fn list_todos(&self, scope: &Scope, filter: &TodoFilter) -> Result<Vec<Todo>, DbError>;
    async fn update_todo(&self, id: i64, patch: &TodoPatch) -> Result<Todo, DbError>;
    async fn delete_todo(&self, id: i64) -> Result<(), DbError>;

    // -- Attachments --
    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, DbError>;
    async fn get_attachment(&self, id: i64) -> Result<Attachment, DbError>;
    async fn list_attachments(&self, todo_id: i64) -> Result<Vec<Attachment>, DbError>;
    async fn list_project_attachments(&self, project_id: i64)
        -> Result<Vec<Attachment>, DbError>;
    async fn set_attachment_thumbnail(&self, id: i64, path: &str) -> Result<(), DbError>;
    async fn delete_attachment(&self, id: i64) -> Result<Attachment, DbError>;

    // -- Assignments --
    async fn create_assignment(
        &self,
        todo_id: i64,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<Assignment, DbError>;
    async fn delete_assignment(&self, todo_id: i64, user_id: &str) -> Result<(), DbError>;
    async fn list_assignees(&self, todo_id: i64) -> Result<Vec<User>, DbError>;

    // -- Users --
    async fn create_user(&self, input: &NewUser) -> Result<User, DbError>;
    async fn get_user(&self, id: &str) -> Result<User, DbError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn list_users(&self) -> Result<Vec<User>, DbError>;
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, DbError>;
    async fn delete_user(&self, id: &str) -> Result<(), DbError>;

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError>;
    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DbError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), DbError>;
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DbError>;

    // -- Jobs --
    async fn enqueue_job(&self, kind: &str, payload: &Value) -> Result<JobRecord, DbError>;
    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, DbError>;
    async fn complete_job(&self, id: i64) -> Result<(), DbError>;
    /// Record a failed attempt. With `retry_at` the job goes back to the
    /// queue, otherwise it is marked failed for good.
    async fn fail_job(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRecord, DbError>;
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>, DbError>;
    async fn requeue_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<usize, DbError>;
}
