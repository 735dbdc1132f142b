//! Reads a POST body, urlencoded or multipart, into a [`FormSubmission`].

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;

use trellis_core::{FileBlob, FormSubmission};

use crate::error::ActionError;

/// Extractor for the raw, ordered pairs of a form POST.
pub struct FormBody(pub FormSubmission);

impl<S> FromRequest<S> for FormBody
where
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ActionError::BadForm(e.body_text()))?;
            read_multipart(multipart).await.map(FormBody)
        } else if content_type.is_empty()
            || content_type.starts_with("application/x-www-form-urlencoded")
        {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ActionError::BadForm(e.body_text()))?;
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
                .map_err(|e| ActionError::BadForm(e.to_string()))?;
            Ok(FormBody(pairs.into_iter().collect()))
        } else {
            Err(ActionError::BadForm(format!(
                "unsupported content type: {content_type}"
            )))
        }
    }
}

/// Parts with a filename become file blobs; everything else is text.
async fn read_multipart(mut multipart: Multipart) -> Result<FormSubmission, ActionError> {
    let mut submission = FormSubmission::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ActionError::BadForm(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ActionError::BadForm(e.body_text()))?;
                submission.append(name, FileBlob::new(filename, content_type, data));
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ActionError::BadForm(e.body_text()))?;
                submission.append(name, text);
            }
        }
    }
    Ok(submission)
}
