use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::booking::ScheduledInterviewRow;
use crate::scheduling::pipeline::{ConfirmOutcome, ConfirmRequest};

/// Records a confirmed proposal with its calendar event ids.
pub async fn record_booking(
    pool: &PgPool,
    request: &ConfirmRequest,
    outcome: &ConfirmOutcome,
    confirmed_at: DateTime<Utc>,
) -> Result<ScheduledInterviewRow, AppError> {
    let proposal = &request.proposal;
    let blocks = serde_json::to_value(&proposal.blocks).map_err(anyhow::Error::from)?;
    let event_ids =
        serde_json::to_value(&outcome.calendar_event_ids).map_err(anyhow::Error::from)?;

    let row = sqlx::query_as::<_, ScheduledInterviewRow>(
        r#"
        INSERT INTO scheduled_interviews
            (candidate_id, candidate_name, candidate_email, ashby_stage_id, stage_name,
             status, scheduled_blocks, calendar_event_ids, created_by, confirmed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&proposal.candidate_id)
    .bind(&request.candidate_name)
    .bind(&request.candidate_email)
    .bind(&proposal.stage_id)
    .bind(&proposal.stage_name)
    .bind(outcome.booking_status())
    .bind(blocks)
    .bind(event_ids)
    .bind(&request.created_by)
    .bind(confirmed_at)
    .fetch_one(pool)
    .await?;

    info!(
        "Recorded booking {} for candidate {} ({})",
        row.id, row.candidate_id, row.status
    );
    Ok(row)
}
