use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, Schema};

/// Upload ceiling, checked before anything is written.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub todo_id: i64,
    pub uploader_id: String,
    pub filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub thumbnail_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub todo_id: i64,
    pub uploader_id: String,
    pub filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAttachment {
    pub todo_id: i64,
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.to_ascii_lowercase().starts_with("image/")
}

/// Reduce a client-supplied filename to something safe to embed in a
/// storage key: the last path component, ASCII alphanumerics plus `.-_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn upload_schema() -> Schema {
    Schema::object([
        Field::integer("todoId"),
        Field::file("file", MAX_UPLOAD_BYTES, "File too large (max 10MB)"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FileBlob, FormSubmission};

    #[test]
    fn image_mime_detection() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("IMAGE/JPEG"));
        assert!(!is_image_mime("application/pdf"));
        assert!(!is_image_mime("text/plain"));
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\my photo.png"), "my_photo.png");
        assert_eq!(sanitize_filename("..."), "file");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("résumé.txt"), "r_sum_.txt");
    }

    #[test]
    fn upload_over_limit_is_a_field_error() {
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let form = FormSubmission::new()
            .with("todoId", "4")
            .with("file", FileBlob::new("big.bin", "application/octet-stream", big));
        let errors = upload_schema().parse::<UploadAttachment>(&form).unwrap_err();
        assert_eq!(
            errors.get("file"),
            Some(&["File too large (max 10MB)".to_string()][..])
        );
    }

    #[test]
    fn upload_at_limit_is_accepted() {
        let exact = vec![0u8; MAX_UPLOAD_BYTES];
        let form = FormSubmission::new()
            .with("todoId", "4")
            .with("file", FileBlob::new("ok.bin", "application/octet-stream", exact));
        let mut parsed = upload_schema().parse::<UploadAttachment>(&form).unwrap();
        assert_eq!(parsed.input.todo_id, 4);
        assert_eq!(parsed.take_file("file").unwrap().size(), MAX_UPLOAD_BYTES);
    }
}
