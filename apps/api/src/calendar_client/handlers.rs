use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::scheduling::models::TimeWindow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FreeBusyRequest {
    pub emails: Vec<String>,
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FreeBusyResponse {
    pub busy_map: HashMap<String, Vec<TimeWindow>>,
}

impl FreeBusyRequest {
    fn validate(&self) -> Result<TimeWindow, AppError> {
        if let Some(bad) = self.emails.iter().find(|e| !e.contains('@')) {
            return Err(AppError::Validation(format!("'{bad}' is not an email address")));
        }
        TimeWindow::new(self.time_min, self.time_max)
            .map_err(|e| AppError::Validation(e.to_string()))
    }
}

/// POST /api/v1/calendar/freebusy
pub async fn handle_free_busy(
    State(state): State<AppState>,
    Json(req): Json<FreeBusyRequest>,
) -> Result<Json<FreeBusyResponse>, AppError> {
    let horizon = req.validate()?;
    let busy_map = state.calendar.free_busy(&req.emails, horizon).await?;
    Ok(Json(FreeBusyResponse { busy_map }))
}
