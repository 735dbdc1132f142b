use axum::{
    extract::{Path, Query},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;

use trellis_core::todo::TodoFilter;
use trellis_core::{Page, PageRequest};

use super::AppState;
use crate::actions::ActionContext;
use crate::error::ActionError;
use crate::views::pages::{self, TodoView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(projects_page))
        .route("/projects/{id}", get(project_page))
        .route("/todos/{id}", get(todo_page))
        .route("/admin/users", get(users_page))
}

async fn projects_page(
    ctx: ActionContext,
    Query(req): Query<PageRequest>,
) -> Result<Html<String>, ActionError> {
    let projects = ctx.db.list_projects(&ctx.scope()).await?;
    let page = Page::paginate(projects, req);
    Ok(Html(pages::projects(&ctx.actor, &page)))
}

async fn project_page(
    ctx: ActionContext,
    Path(id): Path<i64>,
    Query(req): Query<PageRequest>,
) -> Result<Html<String>, ActionError> {
    let scope = ctx.scope();
    let project = ctx.db.get_project(&scope, id).await?;
    let filter = TodoFilter {
        project_id: Some(id),
        ..Default::default()
    };
    let todos = ctx.db.list_todos(&scope, &filter).await?;
    let page = Page::paginate(todos, req);
    Ok(Html(pages::project(&ctx.actor, &project, &page)))
}

async fn todo_page(
    ctx: ActionContext,
    Path(id): Path<i64>,
) -> Result<Html<String>, ActionError> {
    let todo = ctx.db.get_todo(&ctx.scope(), id).await?;
    let attachments = ctx.db.list_attachments(id).await?;
    let assignees = ctx.db.list_assignees(id).await?;

    let candidates = if ctx.is(&todo.owner_id) {
        ctx.db
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.id != todo.owner_id && !assignees.iter().any(|a| a.id == u.id))
            .collect()
    } else {
        Vec::new()
    };

    let view = TodoView {
        todo: &todo,
        attachments: &attachments,
        assignees: &assignees,
        candidates: &candidates,
    };
    Ok(Html(pages::todo(&ctx.actor, &view)))
}

#[derive(Debug, Default, Deserialize)]
struct EditQuery {
    edit: Option<String>,
}

async fn users_page(
    ctx: ActionContext,
    Query(req): Query<PageRequest>,
    Query(q): Query<EditQuery>,
) -> Result<Html<String>, ActionError> {
    if !ctx.actor.is_admin() {
        return Err(ActionError::Forbidden);
    }
    let users = ctx.db.list_users().await?;
    let editing = q
        .edit
        .as_deref()
        .and_then(|id| users.iter().find(|u| u.id == id))
        .cloned();
    let page = Page::paginate(users, req);
    Ok(Html(pages::users(&ctx.actor, &page, editing.as_ref())))
}
