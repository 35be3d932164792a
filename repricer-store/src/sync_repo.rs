use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use repricer_core::execution::SyncJob;
use repricer_core::repository::SyncJobRepository;

type RepoError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgSyncJobRepository {
    pool: PgPool,
}

impl PgSyncJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncJobRepository for PgSyncJobRepository {
    async fn create(&self, job: &SyncJob) -> Result<Uuid, RepoError> {
        sqlx::query(
            "INSERT INTO sync_jobs \
             (id, organization_id, marketplace, job_type, status, records_processed, \
              error_message, started_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(job.id)
        .bind(job.organization_id)
        .bind(&job.marketplace)
        .bind(&job.job_type)
        .bind(job.status.as_str())
        .bind(job.records_processed as i32)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(job.id)
    }

    async fn update(&self, job: &SyncJob) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE sync_jobs SET status = $1, records_processed = $2, error_message = $3, \
             completed_at = $4 WHERE id = $5",
        )
        .bind(job.status.as_str())
        .bind(job.records_processed as i32)
        .bind(&job.error_message)
        .bind(job.completed_at)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
