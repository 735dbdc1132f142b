//! The thumbnail worker: polls the durable job queue and runs jobs with
//! bounded concurrency.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use trellis_core::job::{GenerateThumbnail, Job, JobRecord, JobStatus};
use trellis_db::{Database, DbError};
use trellis_store::{thumbnail_key, ObjectStore};

use crate::config::WorkerConfig;
use crate::jobs::JobError;

pub const THUMBNAIL_SIZE: u32 = 200;
pub const THUMBNAIL_QUALITY: u8 = 80;

/// Decode any supported image and center-crop it to a
/// `THUMBNAIL_SIZE`-square JPEG.
pub fn render_thumbnail(data: &[u8]) -> Result<Vec<u8>, JobError> {
    let img = image::load_from_memory(data).map_err(|e| JobError::Image(e.to_string()))?;
    let thumb = img.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(thumb.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, THUMBNAIL_QUALITY))
        .map_err(|e| JobError::Image(e.to_string()))?;
    Ok(out.into_inner())
}

/// Store a thumbnail beside the source file and record it on the
/// attachment. Returns the thumbnail key.
pub async fn generate_thumbnail(
    db: &dyn Database,
    store: &dyn ObjectStore,
    task: &GenerateThumbnail,
) -> Result<String, JobError> {
    let source = store.get(&task.stored_path).await?;
    let jpeg = tokio::task::spawn_blocking(move || render_thumbnail(&source))
        .await
        .map_err(|e| JobError::Image(e.to_string()))??;

    let key = thumbnail_key(&task.stored_path);
    store.put(&key, Bytes::from(jpeg)).await?;
    if let Err(e) = db.set_attachment_thumbnail(task.attachment_id, &key).await {
        // The attachment went away while we worked.
        if let Err(cleanup) = store.delete(&key).await {
            warn!(key, "failed to remove orphaned thumbnail: {cleanup}");
        }
        return Err(e.into());
    }
    Ok(key)
}

pub struct Worker {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ObjectStore>, config: WorkerConfig) -> Self {
        Self { db, store, config }
    }

    /// Poll forever. Each tick claims jobs until the queue is empty or every
    /// permit is taken.
    pub async fn run(self) {
        let concurrency = self.config.concurrency;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        let permits = Arc::new(Semaphore::new(concurrency));
        let worker = Arc::new(self);
        info!(concurrency, "worker polling for jobs");

        loop {
            ticker.tick().await;
            loop {
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    break;
                };
                match worker.db.claim_next_job(Utc::now()).await {
                    Ok(Some(job)) => {
                        let worker = worker.clone();
                        tokio::spawn(async move {
                            worker.handle(job).await;
                            drop(permit);
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("failed to claim job: {e}");
                        break;
                    }
                }
            }
        }
    }

    /// Claim and run at most one job inline. Returns the job's final status.
    pub async fn run_once(&self) -> Result<Option<JobStatus>, JobError> {
        match self.db.claim_next_job(Utc::now()).await? {
            Some(job) => Ok(Some(self.handle(job).await)),
            None => Ok(None),
        }
    }

    async fn handle(&self, job: JobRecord) -> JobStatus {
        debug!(job_id = job.id, kind = %job.kind, attempt = job.attempts, "running job");
        let result = self.process(&job).await;
        match self.settle(&job, result).await {
            Ok(status) => status,
            Err(e) => {
                error!(job_id = job.id, "failed to record job outcome: {e}");
                JobStatus::Running
            }
        }
    }

    async fn process(&self, job: &JobRecord) -> Result<(), JobError> {
        match job.job()? {
            Job::GenerateThumbnail(task) => {
                let key = generate_thumbnail(&*self.db, &*self.store, &task).await?;
                info!(attachment_id = task.attachment_id, key, "thumbnail generated");
            }
        }
        Ok(())
    }

    async fn settle(
        &self,
        job: &JobRecord,
        result: Result<(), JobError>,
    ) -> Result<JobStatus, DbError> {
        let e = match result {
            Ok(()) => {
                self.db.complete_job(job.id).await?;
                return Ok(JobStatus::Done);
            }
            Err(e) => e,
        };

        if e.is_retryable() && job.attempts < self.config.max_attempts {
            let delay = self.config.retry_backoff * job.attempts.max(1) as i32;
            warn!(job_id = job.id, attempt = job.attempts, "job failed, will retry: {e}");
            let record = self
                .db
                .fail_job(job.id, &e.to_string(), Some(Utc::now() + delay))
                .await?;
            Ok(record.status)
        } else {
            error!(job_id = job.id, attempt = job.attempts, "job failed: {e}");
            let record = self.db.fail_job(job.id, &e.to_string(), None).await?;
            Ok(record.status)
        }
    }
}
