use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::post,
    Router,
};

use trellis_core::attachment::MAX_UPLOAD_BYTES;

use super::AppState;
use crate::actions::{self, ActionContext};
use crate::error::ActionError;
use crate::form::FormBody;

/// Room for a file at the ceiling plus the multipart framing, so oversized
/// files reach validation and get a field error instead of a 413.
const UPLOAD_BODY_LIMIT: usize = 2 * MAX_UPLOAD_BYTES;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(project_action))
        .route("/todos", post(todo_action))
        .route(
            "/attachments",
            post(attachment_action).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/admin/users", post(user_action))
}

async fn project_action(
    ctx: ActionContext,
    FormBody(form): FormBody,
) -> Result<Redirect, ActionError> {
    actions::projects::dispatch(&ctx, &form).await
}

async fn todo_action(
    ctx: ActionContext,
    FormBody(form): FormBody,
) -> Result<Redirect, ActionError> {
    actions::todos::dispatch(&ctx, &form).await
}

async fn attachment_action(
    ctx: ActionContext,
    FormBody(form): FormBody,
) -> Result<Redirect, ActionError> {
    actions::attachments::dispatch(&ctx, &form).await
}

async fn user_action(
    ctx: ActionContext,
    FormBody(form): FormBody,
) -> Result<Redirect, ActionError> {
    actions::users::dispatch(&ctx, &form).await
}
