//! Collaborator seams used by the scheduling pipeline.
//!
//! `AppState` wires the real Google and Ashby clients in; tests swap in fakes
//! without touching the pipeline or handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::scheduling::models::TimeWindow;

/// A calendar event to create on confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalendarEvent {
    pub organizer_email: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee_emails: Vec<String>,
    pub location: Option<String>,
}

/// Free/busy lookups and event creation.
#[async_trait]
pub trait BusyCalendar: Send + Sync {
    /// Busy intervals per email within `horizon`, fetched in one batched request.
    /// Every requested email must be present in the map.
    async fn busy_slots(
        &self,
        emails: &[String],
        horizon: TimeWindow,
    ) -> Result<HashMap<String, Vec<TimeWindow>>, AppError>;

    /// Creates the event and returns the provider's opaque event id.
    async fn create_event(&self, event: &NewCalendarEvent) -> Result<String, AppError>;
}

/// Candidate availability as recorded by the recruiting platform.
#[async_trait]
pub trait CandidateAvailability: Send + Sync {
    async fn candidate_windows(&self, application_id: &str) -> Result<Vec<TimeWindow>, AppError>;
}
