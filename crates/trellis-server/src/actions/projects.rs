use axum::response::Redirect;

use trellis_core::intent::{by_id_schema, read_intent, ById};
use trellis_core::project::{self, CreateProject, UpdateProject};
use trellis_core::{FormSubmission, ProjectIntent};

use super::{see_other, validate, ActionContext};
use crate::error::ActionError;

/// `POST /projects`
pub async fn dispatch(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    match read_intent::<ProjectIntent>(form)? {
        ProjectIntent::Create => create(ctx, form).await,
        ProjectIntent::Update => update(ctx, form).await,
        ProjectIntent::Delete => delete(ctx, form).await,
    }
}

async fn create(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: CreateProject = validate(project::create_schema(), form)?.input;
    let created = ctx.db.create_project(&ctx.actor.user_id, &input).await?;
    tracing::info!(project_id = created.id, owner = %ctx.actor.user_id, "project created");
    Ok(see_other(format!("/projects/{}", created.id)))
}

async fn update(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let input: UpdateProject = validate(project::update_schema(), form)?.input;
    ctx.db.get_project(&ctx.scope(), input.id).await?;
    let updated = ctx.db.update_project(&input).await?;
    Ok(see_other(format!("/projects/{}", updated.id)))
}

async fn delete(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let ById { id } = validate(by_id_schema(), form)?.input;
    ctx.db.get_project(&ctx.scope(), id).await?;

    let attachments = ctx.db.list_project_attachments(id).await?;
    ctx.db.delete_project(id).await?;
    tracing::info!(project_id = id, files = attachments.len(), "project deleted");
    ctx.remove_files(&attachments).await;

    Ok(see_other("/"))
}
