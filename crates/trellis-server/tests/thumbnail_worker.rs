//! Upload an image through the form endpoint, then drain the queue with the
//! worker and check the thumbnail it leaves behind.

use std::io::Cursor;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use image::{DynamicImage, ImageFormat, RgbImage};

use trellis_core::job::JobStatus;
use trellis_db::{Database, Scope};
use trellis_server::config::WorkerConfig;
use trellis_server::test_helpers::{test_app, TestApp, Upload};
use trellis_server::worker::Worker;
use trellis_store::ObjectStore;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([30, 60, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Create a project and todo for a fresh user, upload `data`, and return
/// `(cookie, todo id)`.
async fn seed_upload(
    app: &TestApp,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> (String, i64) {
    let ada = app.user("ada@example.com").await;
    let cookie = app.sign_in(&ada).await;
    app.post_form("/projects", &cookie, &[("intent", "createProject"), ("name", "Pics")])
        .await;
    let project = app
        .db
        .list_projects(&Scope::All)
        .await
        .unwrap()
        .remove(0);
    let pid = project.id.to_string();
    app.post_form(
        "/todos",
        &cookie,
        &[("intent", "createTodo"), ("projectId", &pid), ("title", "Photo")],
    )
    .await;
    let todo_id = app
        .db
        .list_todos(&Scope::All, &Default::default())
        .await
        .unwrap()[0]
        .id;

    let tid = todo_id.to_string();
    let resp = app
        .post_multipart(
            "/attachments",
            &cookie,
            &[("intent", "uploadAttachment"), ("todoId", &tid)],
            Some(Upload {
                field: "file",
                filename,
                content_type,
                data,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    (cookie, todo_id)
}

fn worker(app: &TestApp, max_attempts: i64) -> Worker {
    Worker::new(
        app.db.clone(),
        app.store.clone() as Arc<dyn ObjectStore>,
        WorkerConfig {
            max_attempts,
            ..WorkerConfig::default()
        },
    )
}

#[tokio::test]
async fn worker_writes_a_square_jpeg_thumbnail() {
    let app = test_app().await;
    let (cookie, todo_id) = seed_upload(&app, "wide.png", "image/png", &png(400, 100)).await;

    let status = worker(&app, 3).run_once().await.unwrap();
    assert_eq!(status, Some(JobStatus::Done));
    assert_eq!(worker(&app, 3).run_once().await.unwrap(), None);

    let attachment = app.db.list_attachments(todo_id).await.unwrap().remove(0);
    let thumb = attachment.thumbnail_path.expect("thumbnail recorded");
    assert_ne!(thumb, attachment.stored_path);

    let bytes = app.store.get(&thumb).await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));

    let resp = app.get(&format!("/{thumb}"), &cookie).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
}

#[tokio::test]
async fn undecodable_image_fails_without_retry() {
    let app = test_app().await;
    let (_, todo_id) = seed_upload(&app, "fake.png", "image/png", b"not really a png").await;

    let status = worker(&app, 3).run_once().await.unwrap();
    assert_eq!(status, Some(JobStatus::Failed));
    assert!(app.db.list_jobs(Some(JobStatus::Queued)).await.unwrap().is_empty());

    let failed = app.db.list_jobs(Some(JobStatus::Failed)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].last_error.is_some());

    let attachment = app.db.list_attachments(todo_id).await.unwrap().remove(0);
    assert_eq!(attachment.thumbnail_path, None);
}

#[tokio::test]
async fn missing_source_file_fails_permanently() {
    let app = test_app().await;
    let (_, todo_id) = seed_upload(&app, "gone.png", "image/png", &png(10, 10)).await;
    let attachment = app.db.list_attachments(todo_id).await.unwrap().remove(0);
    app.store.delete(&attachment.stored_path).await.unwrap();

    let status = worker(&app, 3).run_once().await.unwrap();
    assert_eq!(status, Some(JobStatus::Failed));
    assert_eq!(app.db.list_jobs(Some(JobStatus::Failed)).await.unwrap()[0].attempts, 1);
}
