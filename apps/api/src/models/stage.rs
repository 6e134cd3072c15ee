use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::scheduling::models::{Interviewer, PanelFormat, StageConfig};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StageConfigRow {
    pub id: Uuid,
    pub ashby_stage_id: String,
    pub stage_name: String,
    pub job_id: Option<String>,
    pub duration_minutes: i32,
    pub break_minutes: i32,
    pub interviewer_count: i32,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StageConfigRow {
    /// Builds the engine's view of this stage. Negative minute counts or an unknown
    /// format mean the row was written outside this service.
    pub fn into_stage_config(self, pool: Vec<Interviewer>) -> Result<StageConfig, AppError> {
        let non_negative = |field: &str, value: i32| {
            u32::try_from(value).map_err(|_| {
                AppError::Validation(format!(
                    "Stage '{}' has a negative {field} ({value})",
                    self.ashby_stage_id
                ))
            })
        };

        let duration_minutes = non_negative("duration_minutes", self.duration_minutes)?;
        let break_minutes = non_negative("break_minutes", self.break_minutes)?;
        let interviewer_count = non_negative("interviewer_count", self.interviewer_count)?;
        let format = self
            .format
            .parse::<PanelFormat>()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(StageConfig {
            id: self.id,
            external_stage_id: self.ashby_stage_id,
            stage_name: self.stage_name,
            duration_minutes,
            break_minutes,
            interviewer_count,
            format,
            pool,
        })
    }
}
