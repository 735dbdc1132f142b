use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use trellis_core::job::{JobRecord, JobStatus};

use super::super::{NotFoundExt, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_job(row: &Row) -> rusqlite::Result<JobRecord> {
    let status_str: String = row.get("status")?;
    let payload_str: String = row.get("payload")?;
    let payload: Value = serde_json::from_str(&payload_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(JobRecord {
        id: row.get("id")?,
        kind: row.get("kind")?,
        payload,
        status: JobStatus::parse_str(&status_str).unwrap_or(JobStatus::Failed),
        attempts: row.get("attempts")?,
        last_error: row.get("last_error")?,
        run_at: row.get("run_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn enqueue_job_sync(&self, kind: &str, payload: &Value) -> Result<JobRecord, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.query_row(
                "INSERT INTO jobs (kind, payload, status, attempts, run_at, created_at, updated_at)
                 VALUES (?1, ?2, 'queued', 0, ?3, ?3, ?3)
                 RETURNING *",
                params![kind, payload.to_string(), now],
                row_to_job,
            )
            .to_db()
        })
    }

    /// Atomically move the oldest due job to `running` and count the attempt.
    pub fn claim_next_job_sync(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE jobs
                 SET status = 'running', attempts = attempts + 1, updated_at = ?1
                 WHERE id = (
                     SELECT id FROM jobs
                     WHERE status = 'queued' AND run_at <= ?1
                     ORDER BY run_at ASC, id ASC
                     LIMIT 1
                 )
                 RETURNING *",
                params![now],
                row_to_job,
            )
            .optional()
            .to_db()
        })
    }

    pub fn complete_job_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE jobs SET status = 'done', last_error = NULL, updated_at = ?1
                     WHERE id = ?2",
                    params![Utc::now(), id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("job {id}")));
            }
            Ok(())
        })
    }

    pub fn fail_job_sync(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRecord, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let (status, run_at) = match retry_at {
                Some(at) => (JobStatus::Queued, Some(at)),
                None => (JobStatus::Failed, None),
            };
            conn.query_row(
                "UPDATE jobs
                 SET status = ?1, last_error = ?2, run_at = COALESCE(?3, run_at), updated_at = ?4
                 WHERE id = ?5
                 RETURNING *",
                params![status.as_str(), error, run_at, now, id],
                row_to_job,
            )
            .or_not_found(|| format!("job {id}"))
        })
    }

    pub fn list_jobs_sync(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM jobs
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY id",
                )
                .to_db()?;
            let jobs = stmt
                .query_map(params![status.map(|s| s.as_str())], row_to_job)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(jobs)
        })
    }

    /// Put jobs stuck in `running` (worker died mid-job) back in the queue.
    pub fn requeue_stale_jobs_sync(&self, older_than: DateTime<Utc>) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status = 'queued', updated_at = ?1
                 WHERE status = 'running' AND updated_at < ?2",
                params![Utc::now(), older_than],
            )
            .to_db()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn claim_empty() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        assert!(db.claim_next_job_sync(Utc::now()).unwrap().is_none());
    }

    #[test]
    fn job_lifecycle() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let job = db
            .enqueue_job_sync("generateThumbnail", &json!({ "attachmentId": 1, "storedPath": "p" }))
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);

        let claimed = db.claim_next_job_sync(Utc::now()).unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.payload["attachmentId"], 1);

        // nothing left to claim while it runs
        assert!(db.claim_next_job_sync(Utc::now()).unwrap().is_none());

        db.complete_job_sync(job.id).unwrap();
        let done = db.list_jobs_sync(Some(JobStatus::Done)).unwrap();
        assert_eq!(done.len(), 1);
    }

    #[test]
    fn retry_then_fail() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let job = db.enqueue_job_sync("generateThumbnail", &json!({})).unwrap();
        let now = Utc::now();
        db.claim_next_job_sync(now).unwrap().unwrap();

        let retry_at = now + Duration::seconds(30);
        let requeued = db.fail_job_sync(job.id, "boom", Some(retry_at)).unwrap();
        assert_eq!(requeued.status, JobStatus::Queued);
        assert_eq!(requeued.last_error.as_deref(), Some("boom"));

        // not due yet
        assert!(db.claim_next_job_sync(now).unwrap().is_none());
        let again = db
            .claim_next_job_sync(retry_at + Duration::seconds(1))
            .unwrap()
            .unwrap();
        assert_eq!(again.attempts, 2);

        let failed = db.fail_job_sync(job.id, "boom again", None).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(db
            .claim_next_job_sync(retry_at + Duration::hours(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn stale_running_jobs_are_requeued() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.enqueue_job_sync("generateThumbnail", &json!({})).unwrap();
        db.claim_next_job_sync(Utc::now()).unwrap().unwrap();

        let n = db
            .requeue_stale_jobs_sync(Utc::now() + Duration::minutes(1))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(db.list_jobs_sync(Some(JobStatus::Queued)).unwrap().len(), 1);
    }
}
