pub mod api;
pub mod forms;
pub mod health;
pub mod pages;
pub mod session;
pub mod uploads;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use trellis_db::Database;
use trellis_store::ObjectStore;

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::jobs::JobQueue;

pub struct InnerAppState {
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn ObjectStore>,
    pub jobs: Arc<dyn JobQueue>,
    pub config: ServerConfig,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(session::routes());

    let protected = Router::new()
        .merge(forms::routes())
        .merge(pages::routes())
        .merge(api::routes())
        .merge(uploads::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
