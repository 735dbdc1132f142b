//! Form-intent handlers.
//!
//! Each resource has one `dispatch` entry point. It reads the `intent`
//! discriminator, then the matching handler validates its fields, checks the
//! actor may act on the target, performs one mutation, runs any side effects
//! and answers with a `303 See Other` to the canonical view.

pub mod attachments;
pub mod projects;
pub mod todos;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;
use serde::de::DeserializeOwned;

use trellis_core::attachment::Attachment;
use trellis_core::{Actor, FormSubmission, Schema, Validated};
use trellis_db::{Database, Scope};
use trellis_store::{thumbnail_key, ObjectStore};

use crate::error::ActionError;
use crate::jobs::JobQueue;
use crate::routes::AppState;

/// Everything a handler may touch. The actor comes from the session only,
/// never from the submitted form.
#[derive(Clone)]
pub struct ActionContext {
    pub actor: Actor,
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn ObjectStore>,
    pub jobs: Arc<dyn JobQueue>,
}

impl ActionContext {
    pub fn scope(&self) -> Scope {
        Scope::from(&self.actor)
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.actor.user_id == user_id
    }

    /// Best-effort removal of stored files and their thumbnails. A missing
    /// file is fine; any other failure is only logged.
    pub(crate) async fn remove_files(&self, attachments: &[Attachment]) {
        for attachment in attachments {
            let thumb = attachment
                .thumbnail_path
                .clone()
                .unwrap_or_else(|| thumbnail_key(&attachment.stored_path));
            for key in [attachment.stored_path.clone(), thumb] {
                if let Err(e) = self.store.delete(&key).await {
                    tracing::warn!(attachment_id = attachment.id, key, "failed to remove file: {e}");
                }
            }
        }
    }
}

impl FromRequestParts<AppState> for ActionContext {
    type Rejection = ActionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or(ActionError::Forbidden)?;
        Ok(ActionContext {
            actor,
            db: state.db.clone(),
            store: state.store.clone(),
            jobs: state.jobs.clone(),
        })
    }
}

pub(crate) fn validate<T: DeserializeOwned>(
    schema: Schema,
    form: &FormSubmission,
) -> Result<Validated<T>, ActionError> {
    schema.parse(form).map_err(ActionError::from)
}

pub(crate) fn see_other(path: impl AsRef<str>) -> Redirect {
    Redirect::to(path.as_ref())
}
