use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use trellis_store::UPLOADS_PREFIX;

use super::AppState;
use crate::error::ActionError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/uploads/{*key}", get(serve_upload))
}

/// Content type for a stored file. Image bytes are sniffed, since a
/// thumbnail is JPEG whatever its source's extension says.
fn content_type(key: &str, data: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(data) {
        return format.to_mime_type();
    }
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain; charset=utf-8",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ActionError> {
    let key = format!("{UPLOADS_PREFIX}/{key}");
    let data = match state.store.get_opt(&key).await {
        Ok(Some(data)) => data,
        Ok(None) | Err(trellis_store::StoreError::InvalidKey(_)) => {
            return Err(ActionError::NotFound(key))
        }
        Err(e) => return Err(e.into()),
    };
    let mime = content_type(&key, &data);
    Ok(([(header::CONTENT_TYPE, mime)], data).into_response())
}

#[cfg(test)]
mod tests {
    use image::ImageFormat;

    use super::*;

    #[test]
    fn sniffs_images_before_extension() {
        let png_magic = b"\x89PNG\r\n\x1a\n\0\0\0\0";
        assert_eq!(content_type("uploads/x.txt", png_magic), ImageFormat::Png.to_mime_type());
        assert_eq!(content_type("uploads/x.TXT", b"hi"), "text/plain; charset=utf-8");
        assert_eq!(content_type("uploads/x", b"hi"), "application/octet-stream");
    }
}
