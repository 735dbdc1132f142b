use axum::{
    extract::{Path, Query},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use trellis_core::todo::TodoFilter;
use trellis_core::{Actor, Priority, Project, Todo};

use super::AppState;
use crate::actions::ActionContext;
use crate::error::ActionError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/{id}", get(get_project))
        .route("/api/todos", get(list_todos))
        .route("/api/todos/{id}", get(get_todo))
}

async fn me(ctx: ActionContext) -> Json<Actor> {
    Json(ctx.actor)
}

async fn list_projects(ctx: ActionContext) -> Result<Json<Vec<Project>>, ActionError> {
    Ok(Json(ctx.db.list_projects(&ctx.scope()).await?))
}

async fn get_project(
    ctx: ActionContext,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ActionError> {
    Ok(Json(ctx.db.get_project(&ctx.scope(), id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoQuery {
    project_id: Option<i64>,
    completed: Option<bool>,
    priority: Option<Priority>,
}

async fn list_todos(
    ctx: ActionContext,
    Query(q): Query<TodoQuery>,
) -> Result<Json<Vec<Todo>>, ActionError> {
    let filter = TodoFilter {
        project_id: q.project_id,
        completed: q.completed,
        priority: q.priority,
    };
    Ok(Json(ctx.db.list_todos(&ctx.scope(), &filter).await?))
}

async fn get_todo(ctx: ActionContext, Path(id): Path<i64>) -> Result<Json<Todo>, ActionError> {
    Ok(Json(ctx.db.get_todo(&ctx.scope(), id).await?))
}
