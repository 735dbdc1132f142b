use thiserror::Error;

use crate::schema::FieldErrors;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid operation")]
    MissingIntent,

    #[error("invalid operation: {0}")]
    UnknownIntent(String),

    #[error("validation failed: {0}")]
    Invalid(FieldErrors),
}

impl From<FieldErrors> for FormError {
    fn from(errors: FieldErrors) -> Self {
        FormError::Invalid(errors)
    }
}
