use axum::response::Redirect;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use trellis_core::attachment::{self, is_image_mime, sanitize_filename, NewAttachment, UploadAttachment};
use trellis_core::intent::{by_id_schema, read_intent, ById};
use trellis_core::job::{GenerateThumbnail, Job};
use trellis_core::{AttachmentIntent, FormSubmission};
use trellis_store::upload_key;

use super::{see_other, validate, ActionContext};
use crate::error::ActionError;

/// `POST /attachments`
pub async fn dispatch(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    match read_intent::<AttachmentIntent>(form)? {
        AttachmentIntent::Upload => upload(ctx, form).await,
        AttachmentIntent::Delete => delete(ctx, form).await,
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

async fn upload(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    // Size is enforced by the schema, before anything is written.
    let mut validated = validate::<UploadAttachment>(attachment::upload_schema(), form)?;
    let todo_id = validated.input.todo_id;
    let file = validated
        .take_file("file")
        .ok_or_else(|| ActionError::field("file", "Required"))?;
    ctx.db.get_todo(&ctx.scope(), todo_id).await?;

    let filename = sanitize_filename(&file.filename);
    let key = upload_key(Utc::now().timestamp_millis(), &random_suffix(), &filename);
    let size_bytes = file.size() as i64;
    ctx.store.put(&key, file.data).await?;

    let new = NewAttachment {
        todo_id,
        uploader_id: ctx.actor.user_id.clone(),
        filename,
        stored_path: key.clone(),
        mime_type: file.content_type,
        size_bytes,
    };
    let created = match ctx.db.create_attachment(&new).await {
        Ok(a) => a,
        Err(e) => {
            if let Err(cleanup) = ctx.store.delete(&key).await {
                tracing::warn!(key, "failed to remove orphaned upload: {cleanup}");
            }
            return Err(e.into());
        }
    };
    tracing::info!(attachment_id = created.id, todo_id, size_bytes, "file uploaded");

    if is_image_mime(&created.mime_type) {
        let job = Job::GenerateThumbnail(GenerateThumbnail {
            attachment_id: created.id,
            stored_path: created.stored_path.clone(),
        });
        if let Err(e) = ctx.jobs.enqueue(&job).await {
            tracing::warn!(attachment_id = created.id, "failed to enqueue thumbnail job: {e}");
        }
    }

    Ok(see_other(format!("/todos/{todo_id}")))
}

async fn delete(ctx: &ActionContext, form: &FormSubmission) -> Result<Redirect, ActionError> {
    let ById { id } = validate(by_id_schema(), form)?.input;
    let existing = ctx.db.get_attachment(id).await?;
    let todo = ctx.db.get_todo(&ctx.scope(), existing.todo_id).await?;
    if !ctx.is(&existing.uploader_id) && !ctx.is(&todo.owner_id) {
        return Err(ActionError::Forbidden);
    }

    ctx.remove_files(std::slice::from_ref(&existing)).await;
    ctx.db.delete_attachment(id).await?;
    tracing::info!(attachment_id = id, "attachment deleted");

    Ok(see_other(format!("/todos/{}", existing.todo_id)))
}
