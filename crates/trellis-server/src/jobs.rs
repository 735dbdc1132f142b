use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use trellis_core::job::{Job, JobDecodeError};
use trellis_db::{Database, DbError};
use trellis_store::StoreError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] JobDecodeError),

    #[error("image: {0}")]
    Image(String),

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

impl JobError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Db(DbError::NotFound(_)) | JobError::Store(StoreError::NotFound(_)) => false,
            JobError::Db(_) | JobError::Store(_) | JobError::Unavailable(_) => true,
            JobError::Decode(_) | JobError::Image(_) => false,
        }
    }
}

/// Fire-and-forget background work. Delivery is at-least-once.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns the id of the queued job.
    async fn enqueue(&self, job: &Job) -> Result<i64, JobError>;
}

/// Queue backed by the `jobs` table, drained by `trellis-server worker`.
pub struct DbJobQueue {
    db: Arc<dyn Database>,
}

impl DbJobQueue {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobQueue for DbJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<i64, JobError> {
        let record = self.db.enqueue_job(job.kind(), &job.payload()).await?;
        tracing::debug!(job_id = record.id, kind = job.kind(), "enqueued job");
        Ok(record.id)
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::job::{GenerateThumbnail, JobStatus};
    use trellis_db::SqliteDatabase;

    use super::*;

    #[tokio::test]
    async fn enqueue_writes_a_queued_row() {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let queue = DbJobQueue::new(db.clone());
        let job = Job::GenerateThumbnail(GenerateThumbnail {
            attachment_id: 3,
            stored_path: "uploads/1-abc-cat.png".into(),
        });

        let id = queue.enqueue(&job).await.unwrap();

        let queued = db.list_jobs(Some(JobStatus::Queued)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, id);
        assert_eq!(queued[0].job().unwrap(), job);
    }
}
