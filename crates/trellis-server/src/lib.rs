pub mod actions;
pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod jobs;
pub mod routes;
pub mod sweeper;
pub mod views;
pub mod worker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use trellis_db::{Database, SqliteDatabase};
use trellis_store::{LocalStore, ObjectStore};

use config::{ServerConfig, StorageArgs};
use jobs::DbJobQueue;
use routes::{AppState, InnerAppState};

pub struct Backends {
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn ObjectStore>,
}

/// Open the database (running migrations) and the upload store.
pub fn open_backends(storage: &StorageArgs) -> Result<Backends> {
    let db = SqliteDatabase::open(&storage.db_config())?;
    let store = LocalStore::new(storage.upload_root());
    Ok(Backends {
        db: Arc::new(db),
        store: Arc::new(store),
    })
}

/// Router state with the database-backed job queue.
pub fn app_state(backends: Backends, config: ServerConfig) -> AppState {
    Arc::new(InnerAppState {
        jobs: Arc::new(DbJobQueue::new(backends.db.clone())),
        db: backends.db,
        store: backends.store,
        config,
    })
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
