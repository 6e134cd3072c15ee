use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::store;
use crate::ashby_client::stages::InterviewStage;
use crate::ashby_client::{AshbyCandidate, AshbyJob};
use crate::errors::AppError;
use crate::models::interviewer::InterviewerRow;
use crate::models::stage::StageConfigRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<AshbyJob>,
}

#[derive(Deserialize)]
pub struct CandidateListQuery {
    pub job_id: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct CandidateListResponse {
    pub candidates: Vec<AshbyCandidate>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
pub struct CandidateResponse {
    pub candidate: AshbyCandidate,
}

#[derive(Deserialize)]
pub struct FindCandidateRequest {
    /// An email address, an Ashby profile URL, or a bare candidate id.
    #[serde(alias = "email")]
    pub query: String,
}

#[derive(Deserialize)]
pub struct StagesQuery {
    pub job_id: String,
}

#[derive(Serialize)]
pub struct EnrichedStage {
    #[serde(flatten)]
    pub stage: InterviewStage,
    pub config: Option<StageConfigRow>,
    pub pool: Vec<InterviewerRow>,
}

#[derive(Serialize)]
pub struct StageListResponse {
    pub stages: Vec<EnrichedStage>,
}

/// GET /api/v1/ashby/jobs
/// Every job except closed ones.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<JobListResponse>, AppError> {
    let jobs = state
        .ashby
        .list_jobs()
        .await?
        .into_iter()
        .filter(AshbyJob::is_open)
        .collect();
    Ok(Json(JobListResponse { jobs }))
}

/// GET /api/v1/ashby/candidates
/// Without `job_id` this lists everyone; with it, one page of that job's open applications.
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidateListQuery>,
) -> Result<Json<CandidateListResponse>, AppError> {
    let (candidates, next_cursor) = match params.job_id.as_deref() {
        Some(job_id) => {
            state
                .ashby
                .list_applications(Some(job_id), params.cursor.as_deref(), params.limit)
                .await?
        }
        None => (state.ashby.list_candidates().await?, None),
    };

    Ok(Json(CandidateListResponse {
        total: candidates.len(),
        candidates,
        next_cursor,
    }))
}

/// GET /api/v1/ashby/candidates/:candidate_id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
) -> Result<Json<CandidateResponse>, AppError> {
    let candidate = state.ashby.get_candidate(&candidate_id).await?;
    Ok(Json(CandidateResponse { candidate }))
}

/// POST /api/v1/ashby/find-candidate
pub async fn handle_find_candidate(
    State(state): State<AppState>,
    Json(req): Json<FindCandidateRequest>,
) -> Result<Json<CandidateResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::Validation(
            "An email address or Ashby profile URL is required".to_string(),
        ));
    }

    let candidate = state.ashby.find_candidate(&req.query).await?.ok_or_else(|| {
        AppError::NotFound(
            "No candidate found. Try pasting their Ashby profile URL instead.".to_string(),
        )
    })?;
    Ok(Json(CandidateResponse { candidate }))
}

/// GET /api/v1/ashby/interview-stages?job_id=
/// The job's stages, each with its local scheduling config and pool when one exists.
pub async fn handle_interview_stages(
    State(state): State<AppState>,
    Query(params): Query<StagesQuery>,
) -> Result<Json<StageListResponse>, AppError> {
    let stages = state.ashby.get_interview_stages(&params.job_id).await?;

    let mut enriched = Vec::with_capacity(stages.len());
    for stage in stages {
        let config = store::find_stage_config(&state.db, &stage.id).await?;
        let pool = match &config {
            Some(config) => store::stage_pool(&state.db, config.id, false).await?,
            None => Vec::new(),
        };
        enriched.push(EnrichedStage {
            stage,
            config,
            pool,
        });
    }

    Ok(Json(StageListResponse { stages: enriched }))
}
