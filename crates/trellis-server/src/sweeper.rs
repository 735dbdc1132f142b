use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use trellis_db::{Database, DbError};

/// A job still `running` after this long belongs to a worker that died.
pub const STALE_JOB_MINUTES: i64 = 10;

/// Background task that purges expired sessions and hands stuck jobs back
/// to the queue.
pub async fn run_sweeper(db: Arc<dyn Database>, scan_interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(scan_interval_secs.max(1)));
    loop {
        ticker.tick().await;
        if let Err(e) = sweep(&*db, Utc::now()).await {
            error!("sweeper error: {e}");
        }
    }
}

/// Returns `(sessions purged, jobs requeued)`.
pub async fn sweep(db: &dyn Database, now: DateTime<Utc>) -> Result<(usize, usize), DbError> {
    let sessions = db.purge_expired_sessions(now).await?;
    let jobs = db
        .requeue_stale_jobs(now - chrono::Duration::minutes(STALE_JOB_MINUTES))
        .await?;
    if sessions > 0 || jobs > 0 {
        info!(sessions, jobs, "sweeper: purged expired sessions, requeued stale jobs");
    }
    Ok((sessions, jobs))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trellis_core::job::JobStatus;
    use trellis_core::user::{NewUser, Role};
    use trellis_db::SqliteDatabase;

    use super::*;

    #[tokio::test]
    async fn sweep_empty_db() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        assert_eq!(sweep(&db, Utc::now()).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "h".into(),
                roles: vec![Role::User],
            })
            .await
            .unwrap();
        let now = Utc::now();
        db.create_session(&user.id, "old", now - chrono::Duration::hours(1))
            .await
            .unwrap();
        db.create_session(&user.id, "live", now + chrono::Duration::hours(1))
            .await
            .unwrap();

        let (sessions, _) = sweep(&db, now).await.unwrap();
        assert_eq!(sessions, 1);
        assert!(db.find_session_user("live", now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recent_running_jobs_untouched() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.enqueue_job("generateThumbnail", &json!({})).await.unwrap();
        db.claim_next_job(Utc::now()).await.unwrap().unwrap();

        let (_, jobs) = sweep(&db, Utc::now()).await.unwrap();
        assert_eq!(jobs, 0);
        assert_eq!(db.list_jobs(Some(JobStatus::Running)).await.unwrap().len(), 1);

        let later = Utc::now() + chrono::Duration::minutes(STALE_JOB_MINUTES + 1);
        let (_, jobs) = sweep(&db, later).await.unwrap();
        assert_eq!(jobs, 1);
    }
}
