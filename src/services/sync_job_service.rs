//! Sync job orchestration.
//!
//! `run_job` only flips a pending job to running and hands it to a spawned
//! executor; the HTTP caller gets the running job back immediately. The
//! executor finishes the job unless it was cancelled in the meantime.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::event::{DomainEvent, EventType},
    models::integration::{
        CreateSyncJobRequest, SyncDirection, SyncEntity, SyncJob, SyncJobFilter, SyncJobStatus,
    },
    services::event_bus::EventBus,
    services::integration_service,
};

/// Queue a job for an enabled integration.
///
/// # Errors
///
/// - `NotFound`: the integration does not exist for this business
/// - `Conflict`: the integration is disabled
pub async fn create_job(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateSyncJobRequest,
) -> Result<SyncJob, AppError> {
    let integration =
        integration_service::get_integration(pool, api_key_id, request.integration_id).await?;
    if !integration.is_enabled {
        return Err(AppError::Conflict(format!(
            "Integration '{}' is disabled",
            integration.name
        )));
    }

    let job = sqlx::query_as::<_, SyncJob>(
        r#"
        INSERT INTO sync_jobs (api_key_id, integration_id, entity, direction, status)
        VALUES ($1, $2, $3, $4, 'pending')
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(integration.id)
    .bind(request.entity.as_str())
    .bind(request.direction.as_str())
    .fetch_one(pool)
    .await?;

    tracing::info!(
        job_id = %job.id,
        entity = %job.entity,
        direction = %job.direction,
        "Sync job created"
    );

    Ok(job)
}

/// Start a pending job and spawn its executor.
pub async fn run_job(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    job_id: Uuid,
) -> Result<SyncJob, AppError> {
    let job = change_status(pool, api_key_id, job_id, SyncJobStatus::Running).await?;

    tracing::info!(job_id = %job.id, "Sync job started");
    tokio::spawn(execute(pool.clone(), events.clone(), job.clone()));

    Ok(job)
}

pub async fn cancel_job(
    pool: &DbPool,
    api_key_id: Uuid,
    job_id: Uuid,
) -> Result<SyncJob, AppError> {
    let job = change_status(pool, api_key_id, job_id, SyncJobStatus::Cancelled).await?;
    tracing::info!(job_id = %job.id, "Sync job cancelled");
    Ok(job)
}

pub async fn get_job(pool: &DbPool, api_key_id: Uuid, job_id: Uuid) -> Result<SyncJob, AppError> {
    sqlx::query_as::<_, SyncJob>("SELECT * FROM sync_jobs WHERE id = $1 AND api_key_id = $2")
        .bind(job_id)
        .bind(api_key_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("sync_job"))
}

/// Jobs newest first.
pub async fn list_jobs(
    pool: &DbPool,
    api_key_id: Uuid,
    filter: SyncJobFilter,
) -> Result<Vec<SyncJob>, AppError> {
    let jobs = sqlx::query_as::<_, SyncJob>(
        r#"
        SELECT * FROM sync_jobs
        WHERE api_key_id = $1
          AND ($2::UUID IS NULL OR integration_id = $2)
          AND ($3::TEXT IS NULL OR status = $3)
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    )
    .bind(api_key_id)
    .bind(filter.integration_id)
    .bind(filter.status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

async fn change_status(
    pool: &DbPool,
    api_key_id: Uuid,
    job_id: Uuid,
    next: SyncJobStatus,
) -> Result<SyncJob, AppError> {
    let mut tx = pool.begin().await?;

    let job = sqlx::query_as::<_, SyncJob>(
        "SELECT * FROM sync_jobs WHERE id = $1 AND api_key_id = $2 FOR UPDATE",
    )
    .bind(job_id)
    .bind(api_key_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("sync_job"))?;

    let next = job.status()?.transition_to(next)?;

    let job = sqlx::query_as::<_, SyncJob>(
        r#"
        UPDATE sync_jobs
        SET status = $2,
            started_at = CASE WHEN $2 = 'running' THEN NOW() ELSE started_at END,
            finished_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE finished_at END
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(job)
}

/// Do the work of a running job. Returns the number of records processed.
async fn perform(pool: &DbPool, job: &SyncJob) -> Result<i64, String> {
    let entity = SyncEntity::parse(&job.entity)
        .ok_or_else(|| format!("Unknown sync entity '{}'", job.entity))?;
    let direction = SyncDirection::parse(&job.direction)
        .ok_or_else(|| format!("Unknown sync direction '{}'", job.direction))?;

    match direction {
        SyncDirection::Export => {
            // Table name comes from the fixed entity list, never from input
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {} WHERE api_key_id = $1",
                entity.table()
            ))
            .bind(job.api_key_id)
            .fetch_one(pool)
            .await
            .map_err(|e| format!("Export query failed: {}", e))?;
            Ok(count)
        }
        SyncDirection::Import => {
            let config: Option<serde_json::Value> =
                sqlx::query_scalar("SELECT config FROM integrations WHERE id = $1")
                    .bind(job.integration_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| format!("Loading integration failed: {}", e))?;

            let has_source = config
                .as_ref()
                .and_then(|c| c.get("source"))
                .and_then(|s| s.as_str())
                .is_some_and(|s| !s.trim().is_empty());
            if !has_source {
                return Err("Integration config has no 'source' to import from".to_string());
            }
            Ok(0)
        }
    }
}

async fn execute(pool: DbPool, events: EventBus, job: SyncJob) {
    let outcome = perform(&pool, &job).await;

    let (status, records, error_message) = match &outcome {
        Ok(count) => (SyncJobStatus::Completed, *count, None),
        Err(message) => (SyncJobStatus::Failed, 0, Some(message.as_str())),
    };

    // Only a job that is still running is finished; a cancel wins
    let finished = sqlx::query_as::<_, SyncJob>(
        r#"
        UPDATE sync_jobs
        SET status = $2, records_processed = $3, error_message = $4, finished_at = NOW()
        WHERE id = $1 AND status = 'running'
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(status.as_str())
    .bind(records)
    .bind(error_message)
    .fetch_optional(&pool)
    .await;

    match finished {
        Ok(Some(job)) => {
            let event_type = if status == SyncJobStatus::Completed {
                tracing::info!(job_id = %job.id, records, "Sync job completed");
                EventType::SyncJobCompleted
            } else {
                tracing::warn!(job_id = %job.id, error = ?job.error_message, "Sync job failed");
                EventType::SyncJobFailed
            };
            events.publish(DomainEvent::new(job.api_key_id, event_type, &job));
        }
        Ok(None) => {
            tracing::info!(job_id = %job.id, "Sync job was cancelled before it finished");
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record sync job result");
        }
    }
}
