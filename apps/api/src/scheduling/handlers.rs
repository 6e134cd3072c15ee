use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::admin::store::load_stage_for_scheduling;
use crate::errors::AppError;
use crate::scheduling::bookings::record_booking;
use crate::scheduling::models::ScheduleProposal;
use crate::scheduling::pipeline::{
    confirm_proposal, propose_for_candidate, ConfirmRequest, InviteFailure, ProposeRequest,
};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProposeResponse {
    pub proposals: Vec<ScheduleProposal>,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub status: String,
    pub calendar_event_ids: BTreeMap<Uuid, Vec<String>>,
    pub failures: Vec<InviteFailure>,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// POST /api/v1/schedule/propose
pub async fn handle_propose(
    State(state): State<AppState>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<ProposeResponse>, AppError> {
    require_non_empty("candidate_id", &req.candidate_id)?;
    require_non_empty("stage_id", &req.stage_id)?;

    let stage = load_stage_for_scheduling(&state.db, &req.stage_id).await?;
    let proposals = propose_for_candidate(
        &state.calendar,
        &state.ashby,
        &stage,
        &req,
        Utc::now(),
        state.config.look_ahead_days,
    )
    .await?;

    Ok(Json(ProposeResponse { proposals }))
}

/// POST /api/v1/schedule/confirm
/// Sends the invites, then records the booking even when some invites failed.
pub async fn handle_confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    require_non_empty("candidate_email", &req.candidate_email)?;
    require_non_empty("created_by", &req.created_by)?;

    let outcome = confirm_proposal(&state.calendar, &req).await?;
    let booking = record_booking(&state.db, &req, &outcome, Utc::now()).await?;

    Ok(Json(ConfirmResponse {
        success: outcome.failures.is_empty(),
        booking_id: booking.id,
        status: booking.status,
        calendar_event_ids: outcome.calendar_event_ids,
        failures: outcome.failures,
    }))
}
