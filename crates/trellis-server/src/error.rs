use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use trellis_core::{FieldErrors, FormError};
use trellis_db::DbError;
use trellis_store::StoreError;

use crate::jobs::JobError;

/// Everything a form action or page can fail with, mapped onto the
/// response contract by [`IntoResponse`].
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("validation failed: {0}")]
    Invalid(FieldErrors),

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid operation")]
    InvalidOperation,

    /// The body could not be read as a form at all.
    #[error("bad form: {0}")]
    BadForm(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn field(field: &str, message: &str) -> Self {
        ActionError::Invalid(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ActionError::Forbidden => StatusCode::FORBIDDEN,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::InvalidOperation | ActionError::BadForm(_) => StatusCode::BAD_REQUEST,
            ActionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FormError> for ActionError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::MissingIntent | FormError::UnknownIntent(_) => ActionError::InvalidOperation,
            FormError::Invalid(errors) => ActionError::Invalid(errors),
        }
    }
}

impl From<FieldErrors> for ActionError {
    fn from(errors: FieldErrors) -> Self {
        ActionError::Invalid(errors)
    }
}

/// Conflicts a handler expects are turned into field errors before they get
/// here; any that slip through are unexpected.
impl From<DbError> for ActionError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ActionError::NotFound(what),
            other => ActionError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        ActionError::Internal(e.to_string())
    }
}

impl From<JobError> for ActionError {
    fn from(e: JobError) -> Self {
        ActionError::Internal(e.to_string())
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ActionError::Invalid(errors) => json!({ "errors": errors }),
            ActionError::Forbidden => json!({ "error": "forbidden" }),
            ActionError::NotFound(_) => json!({ "error": "not found" }),
            ActionError::InvalidOperation => json!({ "error": "invalid operation" }),
            ActionError::BadForm(msg) => json!({ "error": msg }),
            ActionError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                json!({ "error": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
