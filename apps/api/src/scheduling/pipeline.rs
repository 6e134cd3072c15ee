//! Scheduling pipeline: the orchestration around the pure engine.
//!
//! Propose: validate stage → free/busy for the pool → resolve candidate windows →
//!          engine → attach candidate id.
//! Confirm: one calendar event per interview block, failures collected per interviewer.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::scheduling::engine::propose_schedules;
use crate::scheduling::models::{
    InterviewerWithAvailability, PanelFormat, ScheduleBlock, ScheduleProposal, StageConfig,
    TimeWindow,
};
use crate::scheduling::sources::{BusyCalendar, CandidateAvailability, NewCalendarEvent};

pub const DEFAULT_LOOK_AHEAD_DAYS: u32 = 14;
pub const MAX_LOOK_AHEAD_DAYS: u32 = 365;

// ────────────────────────────────────────────────────────────────────────────
// Request / outcome types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProposeRequest {
    pub candidate_id: String,
    pub application_id: Option<String>,
    /// External (recruiting-platform) stage id.
    pub stage_id: String,
    pub candidate_availability: Option<Vec<TimeWindow>>,
    pub look_ahead_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub proposal: ScheduleProposal,
    pub candidate_name: String,
    pub candidate_email: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteFailure {
    pub interviewer_id: Uuid,
    pub interviewer_email: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfirmOutcome {
    /// Event ids per interviewer, in block order. A reused interviewer has several.
    pub calendar_event_ids: BTreeMap<Uuid, Vec<String>>,
    pub failures: Vec<InviteFailure>,
}

impl ConfirmOutcome {
    pub fn event_count(&self) -> usize {
        self.calendar_event_ids.values().map(Vec::len).sum()
    }

    pub fn booking_status(&self) -> &'static str {
        if self.failures.is_empty() {
            "confirmed"
        } else {
            "partially_confirmed"
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Propose
// ────────────────────────────────────────────────────────────────────────────

/// Rejects stage shapes the engine cannot schedule.
pub fn ensure_schedulable(stage: &StageConfig) -> Result<(), AppError> {
    if stage.format == PanelFormat::Parallel {
        return Err(AppError::NotImplemented(format!(
            "Stage '{}' uses the parallel panel format, which cannot be scheduled yet",
            stage.stage_name
        )));
    }
    if stage.interviewer_count == 0 {
        return Err(AppError::Validation(format!(
            "Stage '{}' requires at least one interviewer",
            stage.stage_name
        )));
    }
    if stage.pool.len() < stage.interviewer_count as usize {
        return Err(AppError::InsufficientPool {
            required: stage.interviewer_count,
            available: stage.pool.len(),
        });
    }
    Ok(())
}

/// Runs the full propose flow for one candidate and stage.
pub async fn propose_for_candidate(
    calendar: &dyn BusyCalendar,
    recruiting: &dyn CandidateAvailability,
    stage: &StageConfig,
    request: &ProposeRequest,
    now: DateTime<Utc>,
    default_look_ahead_days: u32,
) -> Result<Vec<ScheduleProposal>, AppError> {
    ensure_schedulable(stage)?;

    let look_ahead = request.look_ahead_days.unwrap_or(default_look_ahead_days);
    if !(1..=MAX_LOOK_AHEAD_DAYS).contains(&look_ahead) {
        return Err(AppError::Validation(format!(
            "look_ahead_days must be between 1 and {MAX_LOOK_AHEAD_DAYS}, got {look_ahead}"
        )));
    }
    let horizon_end = Duration::try_days(i64::from(look_ahead))
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| {
            AppError::Validation(format!("look_ahead_days {look_ahead} runs past the calendar"))
        })?;
    let horizon = TimeWindow {
        start: now,
        end: horizon_end,
    };

    let emails: Vec<String> = stage.pool.iter().map(|iv| iv.email.clone()).collect();
    let busy_map = calendar.busy_slots(&emails, horizon).await?;

    let candidate_windows = resolve_candidate_windows(recruiting, request, horizon).await?;

    let interviewers: Vec<InterviewerWithAvailability> = stage
        .pool
        .iter()
        .map(|iv| {
            let busy = busy_map.get(&iv.email).cloned().unwrap_or_default();
            InterviewerWithAvailability::new(iv.clone(), busy)
        })
        .collect();

    let mut proposals = propose_schedules(&candidate_windows, &interviewers, stage, now)?;
    for proposal in &mut proposals {
        proposal.candidate_id = request.candidate_id.clone();
    }

    info!(
        "Proposed {} schedules for candidate {} at stage {} ({} windows, pool of {})",
        proposals.len(),
        request.candidate_id,
        stage.external_stage_id,
        candidate_windows.len(),
        interviewers.len()
    );

    Ok(proposals)
}

/// Explicit availability, else the platform's recorded windows, else the whole horizon.
async fn resolve_candidate_windows(
    recruiting: &dyn CandidateAvailability,
    request: &ProposeRequest,
    horizon: TimeWindow,
) -> Result<Vec<TimeWindow>, AppError> {
    if let Some(explicit) = request.candidate_availability.as_ref().filter(|w| !w.is_empty()) {
        return explicit
            .iter()
            .map(|w| {
                w.validated()
                    .map_err(|e| AppError::Validation(format!("candidate_availability: {e}")))
            })
            .collect();
    }

    if let Some(application_id) = request.application_id.as_deref() {
        let recorded = recruiting.candidate_windows(application_id).await?;
        if !recorded.is_empty() {
            return Ok(recorded);
        }
    }

    Ok(vec![horizon])
}

// ────────────────────────────────────────────────────────────────────────────
// Confirm
// ────────────────────────────────────────────────────────────────────────────

/// Creates one calendar event per interview block. A failed invite is recorded
/// against its interviewer and the remaining blocks are still attempted.
pub async fn confirm_proposal(
    calendar: &dyn BusyCalendar,
    request: &ConfirmRequest,
) -> Result<ConfirmOutcome, AppError> {
    if request.proposal.interview_blocks().next().is_none() {
        return Err(AppError::Validation(
            "proposal contains no interview blocks".to_string(),
        ));
    }

    let mut outcome = ConfirmOutcome::default();

    for block in &request.proposal.blocks {
        let ScheduleBlock::Interview {
            interviewer_id,
            interviewer_email,
            start_time,
            end_time,
            ..
        } = block
        else {
            continue;
        };

        let event = NewCalendarEvent {
            organizer_email: interviewer_email.clone(),
            title: format!(
                "Interview: {} - {}",
                request.candidate_name, request.proposal.stage_name
            ),
            description: Some("Interview scheduled via Interview Scheduler".to_string()),
            start: *start_time,
            end: *end_time,
            attendee_emails: vec![interviewer_email.clone(), request.candidate_email.clone()],
            location: None,
        };

        match calendar.create_event(&event).await {
            Ok(event_id) => {
                outcome
                    .calendar_event_ids
                    .entry(*interviewer_id)
                    .or_default()
                    .push(event_id);
            }
            Err(e) => {
                warn!("Calendar invite for {interviewer_email} failed: {e}");
                outcome.failures.push(InviteFailure {
                    interviewer_id: *interviewer_id,
                    interviewer_email: interviewer_email.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Confirmed proposal {} for candidate {}: {} events, {} failures",
        request.proposal.id,
        request.proposal.candidate_id,
        outcome.event_count(),
        outcome.failures.len()
    );

    Ok(outcome)
}
