use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tokio::sync::OnceCell;
use tower::ServiceExt;

use trellis_core::job::Job;
use trellis_core::user::{NewUser, Role, User};
use trellis_db::{Database, SqliteDatabase};
use trellis_store::{LocalStore, ObjectStore};

use crate::auth::{hash_password, start_session, SESSION_COOKIE};
use crate::config::ServerConfig;
use crate::jobs::{DbJobQueue, JobError, JobQueue};
use crate::routes::{build_router, InnerAppState};

/// Password of every user made by [`TestApp::create_user`].
pub const TEST_PASSWORD: &str = "password123";

static TEST_HASH: OnceCell<String> = OnceCell::const_new();

/// Router over an in-memory database and a temp-dir upload store.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<dyn Database>,
    pub store: Arc<LocalStore>,
    _dir: tempfile::TempDir,
}

/// Test app with the database-backed job queue.
pub async fn test_app() -> TestApp {
    build(None)
}

/// Test app whose handlers enqueue into `jobs`.
pub async fn test_app_with_queue(jobs: Arc<dyn JobQueue>) -> TestApp {
    build(Some(jobs))
}

fn build(jobs: Option<Arc<dyn JobQueue>>) -> TestApp {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::new(dir.path()));
    let jobs = jobs.unwrap_or_else(|| Arc::new(DbJobQueue::new(db.clone())));
    let state = Arc::new(InnerAppState {
        db: db.clone(),
        store: store.clone() as Arc<dyn ObjectStore>,
        jobs,
        config: ServerConfig::default(),
    });
    TestApp {
        router: build_router(state),
        db,
        store,
        _dir: dir,
    }
}

/// A queue that is always down.
pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
    async fn enqueue(&self, _job: &Job) -> Result<i64, JobError> {
        Err(JobError::Unavailable("queue is down".into()))
    }
}

/// One file part of a multipart request.
pub struct Upload<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

const BOUNDARY: &str = "trellis-test-boundary";

fn multipart_body(fields: &[(&str, &str)], file: Option<&Upload<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(f) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                f.field, f.filename, f.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(f.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn create_user(&self, name: &str, email: &str, roles: Vec<Role>) -> User {
        let hash = TEST_HASH
            .get_or_init(|| async { hash_password(TEST_PASSWORD).await.unwrap() })
            .await;
        self.db
            .create_user(&NewUser {
                name: name.into(),
                email: email.into(),
                password_hash: hash.clone(),
                roles,
            })
            .await
            .unwrap()
    }

    pub async fn user(&self, email: &str) -> User {
        let name = email.split('@').next().unwrap_or(email).to_string();
        self.create_user(&name, email, vec![Role::User]).await
    }

    pub async fn admin(&self, email: &str) -> User {
        let name = email.split('@').next().unwrap_or(email).to_string();
        self.create_user(&name, email, vec![Role::User, Role::Admin])
            .await
    }

    /// Open a session directly and return the `Cookie` header value.
    pub async fn sign_in(&self, user: &User) -> String {
        let token = start_session(&*self.db, &user.id, chrono::Duration::hours(1))
            .await
            .unwrap();
        format!("{SESSION_COOKIE}={token}")
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: &str) -> Response {
        let mut req = Request::builder().uri(path);
        if !cookie.is_empty() {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, path: &str, cookie: &str, pairs: &[(&str, &str)]) -> Response {
        let body = serde_urlencoded::to_string(pairs).unwrap();
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if !cookie.is_empty() {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: &str,
        fields: &[(&str, &str)],
        file: Option<Upload<'_>>,
    ) -> Response {
        let body = multipart_body(fields, file.as_ref());
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if !cookie.is_empty() {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).unwrap()).await
    }

    /// Every key currently in the upload store.
    pub async fn stored_keys(&self) -> Vec<String> {
        self.store.list("uploads").await.unwrap()
    }
}

pub fn location(resp: &Response) -> &str {
    resp.headers()[header::LOCATION].to_str().unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
