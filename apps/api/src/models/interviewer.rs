use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::scheduling::models::Interviewer;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewerRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub ashby_user_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InterviewerRow> for Interviewer {
    fn from(row: InterviewerRow) -> Self {
        Interviewer {
            id: row.id,
            email: row.email,
            name: row.name,
            external_user_id: row.ashby_user_id,
            is_active: row.is_active,
        }
    }
}
