use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::admin::store::{self, NewInterviewer, StageConfigUpsert};
use crate::errors::AppError;
use crate::models::interviewer::InterviewerRow;
use crate::models::stage::StageConfigRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct InterviewerListResponse {
    pub interviewers: Vec<InterviewerRow>,
}

#[derive(Serialize)]
pub struct InterviewerResponse {
    pub interviewer: InterviewerRow,
}

#[derive(Serialize)]
pub struct StageConfigListResponse {
    pub configs: Vec<StageConfigRow>,
}

#[derive(Serialize)]
pub struct StageConfigResponse {
    pub config: StageConfigRow,
}

#[derive(Serialize)]
pub struct SyncUsersResponse {
    pub synced: usize,
}

/// GET /api/v1/admin/interviewers
pub async fn handle_list_interviewers(
    State(state): State<AppState>,
) -> Result<Json<InterviewerListResponse>, AppError> {
    let interviewers = store::list_interviewers(&state.db).await?;
    Ok(Json(InterviewerListResponse { interviewers }))
}

/// POST /api/v1/admin/interviewers
pub async fn handle_create_interviewer(
    State(state): State<AppState>,
    Json(req): Json<NewInterviewer>,
) -> Result<(StatusCode, Json<InterviewerResponse>), AppError> {
    let interviewer = store::create_interviewer(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(InterviewerResponse { interviewer })))
}

/// DELETE /api/v1/admin/interviewers/:id
pub async fn handle_delete_interviewer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    store::delete_interviewer(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/stage-configs
pub async fn handle_list_stage_configs(
    State(state): State<AppState>,
) -> Result<Json<StageConfigListResponse>, AppError> {
    let configs = store::list_stage_configs(&state.db).await?;
    Ok(Json(StageConfigListResponse { configs }))
}

/// POST /api/v1/admin/stage-configs
pub async fn handle_upsert_stage_config(
    State(state): State<AppState>,
    Json(req): Json<StageConfigUpsert>,
) -> Result<(StatusCode, Json<StageConfigResponse>), AppError> {
    let config = store::upsert_stage_config(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(StageConfigResponse { config })))
}

/// POST /api/v1/admin/sync-users
/// Pulls every active Workspace user into the interviewer table.
pub async fn handle_sync_users(
    State(state): State<AppState>,
) -> Result<Json<SyncUsersResponse>, AppError> {
    let domain = state.config.google_workspace_domain.as_deref().ok_or_else(|| {
        AppError::NotConfigured("GOOGLE_WORKSPACE_DOMAIN is not set".to_string())
    })?;

    let users = state.calendar.list_directory_users(domain).await?;
    if users.is_empty() {
        return Err(AppError::NotFound(format!("No users found in domain {domain}")));
    }

    let synced = store::upsert_directory_users(&state.db, &users).await?;
    info!("Directory sync for {domain} complete: {synced} users");
    Ok(Json(SyncUsersResponse { synced }))
}
