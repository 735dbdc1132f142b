use axum::response::Redirect;

use trellis_core::assignment::{self, AssignUser};
use trellis_core::intent::{by_id_schema, read_intent, ById};
use trellis_core::todo::{self, CreateTodo, EditTodo, Todo, UpdateTodo};
use trellis_core::{FormSubmission, TodoIntent, TodoPatch};
use trellis_db::{DbError, Scope};

use super::{see_other, validate, ActionContext};
use crate::error::ActionError;

/// `POST /todos`
pub async fn dispatch(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    match read_intent::<TodoIntent>(form)? {
        TodoIntent::Create => create(ctx, form).await,
        TodoIntent::Update => update(ctx, form).await,
        TodoIntent::Edit => edit(ctx, form).await,
        TodoIntent::Delete => delete(ctx, form).await,
        TodoIntent::Assign => assign(ctx, form).await,
        TodoIntent::Unassign => unassign(ctx, form).await,
    }
}

async fn create(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: CreateTodo = validate(todo::create_schema(), form)?.input;
    ctx.db.get_project(&ctx.scope(), input.project_id).await?;
    let created = ctx.db.create_todo(&ctx.actor.user_id, &input).await?;
    tracing::info!(todo_id = created.id, project_id = created.project_id, "todo created");
    Ok(see_other(format!("/projects/{}", created.project_id)))
}

async fn update(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: UpdateTodo = validate(todo::update_schema(), form)?.input;
    let existing = ctx.db.get_todo(&ctx.scope(), input.id).await?;
    ctx.db.update_todo(input.id, &TodoPatch::from(&input)).await?;
    Ok(see_other(format!("/projects/{}", existing.project_id)))
}

async fn edit(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: EditTodo = validate(todo::edit_schema(), form)?.input;
    ctx.db.get_todo(&ctx.scope(), input.id).await?;
    ctx.db.update_todo(input.id, &TodoPatch::from(&input)).await?;
    Ok(see_other(format!("/todos/{}", input.id)))
}

/// Assignees may edit a todo but only its owner, the project owner or an
/// admin may delete it.
async fn delete(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let ById { id } = validate(by_id_schema(), form)?.input;
    let existing = ctx.db.get_todo(&ctx.scope(), id).await?;
    if !ctx.is(&existing.owner_id) && !ctx.actor.is_admin() {
        let project = ctx.db.get_project(&Scope::All, existing.project_id).await?;
        if !ctx.is(&project.owner_id) {
            return Err(ActionError::Forbidden);
        }
    }

    let attachments = ctx.db.list_attachments(id).await?;
    ctx.db.delete_todo(id).await?;
    ctx.remove_files(&attachments).await;

    Ok(see_other(format!("/projects/{}", existing.project_id)))
}

/// Only the owner of a todo manages who is assigned to it.
async fn owned_todo(ctx: &ActionContext, todo_id: i64) -> Result<Todo, ActionError> {
    let todo = ctx.db.get_todo(&ctx.scope(), todo_id).await?;
    if !ctx.is(&todo.owner_id) {
        return Err(ActionError::Forbidden);
    }
    Ok(todo)
}

async fn assign(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: AssignUser = validate(assignment::assign_schema(), form)?.input;
    let todo = owned_todo(ctx, input.todo_id).await?;

    if input.user_id == todo.owner_id {
        return Err(ActionError::field("userId", "Cannot assign the todo owner"));
    }
    match ctx.db.get_user(&input.user_id).await {
        Ok(_) => {}
        Err(DbError::NotFound(_)) => return Err(ActionError::field("userId", "User not found")),
        Err(e) => return Err(e.into()),
    }

    match ctx
        .db
        .create_assignment(todo.id, &input.user_id, &ctx.actor.user_id)
        .await
    {
        Ok(_) => {}
        Err(DbError::Conflict(_)) => {
            return Err(ActionError::field("userId", "User is already assigned"))
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(todo_id = todo.id, user_id = %input.user_id, "user assigned");

    Ok(see_other(format!("/todos/{}", todo.id)))
}

async fn unassign(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: AssignUser = validate(assignment::assign_schema(), form)?.input;
    let todo = owned_todo(ctx, input.todo_id).await?;
    ctx.db.delete_assignment(todo.id, &input.user_id).await?;
    Ok(see_other(format!("/todos/{}", todo.id)))
}
