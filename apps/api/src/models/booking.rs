use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A confirmed (or partially confirmed) panel, as stored in `scheduled_interviews`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledInterviewRow {
    pub id: Uuid,
    pub candidate_id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub ashby_stage_id: String,
    pub stage_name: String,
    pub status: String,
    pub scheduled_blocks: serde_json::Value,
    pub calendar_event_ids: Option<serde_json::Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}
