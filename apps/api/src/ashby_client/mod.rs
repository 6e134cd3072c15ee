/// Ashby Client: every call to the recruiting platform goes through here.
///
/// Ashby's API is RPC-style: each operation is an authenticated `POST` to
/// `<base>/<operation>` returning `{ success, results, nextCursor, errors }`.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::scheduling::models::TimeWindow;
use crate::scheduling::sources::CandidateAvailability;

pub mod handlers;
pub mod stages;

use stages::{parse_interview_stages, InterviewStage};

const MAX_RETRIES: u32 = 3;
const PAGE_LIMIT: u32 = 100;
/// Upper bound on candidates pulled by a full `candidate.list` walk.
const MAX_LISTED_CANDIDATES: usize = 10_000;
/// Pages of `application.list` scanned when searching by email.
const MAX_SCAN_PAGES: usize = 100;

#[derive(Debug, Error)]
pub enum AshbyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

impl From<AshbyError> for AppError {
    fn from(err: AshbyError) -> Self {
        AppError::UpstreamUnavailable(format!("Ashby: {err}"))
    }
}

#[derive(Debug, Clone)]
pub struct AshbyConfig {
    pub api_key: String,
    pub base_url: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Public records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AshbyCandidate {
    pub id: String,
    pub name: String,
    pub email: String,
    pub application_id: Option<String>,
    pub job_title: Option<String>,
    pub job_id: Option<String>,
    pub current_stage: Option<String>,
    pub current_stage_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AshbyJob {
    pub id: String,
    pub title: String,
    pub status: String,
}

impl AshbyJob {
    pub fn is_open(&self) -> bool {
        self.status != "Closed"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    success: bool,
    results: Option<Value>,
    next_cursor: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

struct Page<T> {
    results: Option<T>,
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEmail {
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email_addresses: Vec<RawEmail>,
    primary_email_address: Option<RawEmail>,
    #[serde(default)]
    application_ids: Vec<String>,
}

impl RawCandidate {
    fn email(&self) -> String {
        self.primary_email_address
            .as_ref()
            .or_else(|| self.email_addresses.first())
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRef {
    id: String,
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawApplication {
    id: String,
    #[serde(default)]
    status: String,
    candidate: Option<RawCandidate>,
    job: Option<RawRef>,
    current_interview_stage: Option<RawRef>,
}

impl RawApplication {
    fn is_open(&self) -> bool {
        self.status != "Hired" && self.status != "Archived"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobInfo {
    default_interview_plan_id: Option<String>,
    #[serde(default)]
    interview_plan_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchedule {
    #[serde(default)]
    availability_windows: Vec<RawAvailability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAvailability {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AshbyClient {
    client: Client,
    config: AshbyConfig,
}

impl AshbyClient {
    pub fn new(config: AshbyConfig) -> Result<Self, AshbyError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            config,
        })
    }

    pub async fn list_jobs(&self) -> Result<Vec<AshbyJob>, AshbyError> {
        let page: Page<Vec<AshbyJob>> = self.post("/job.list", json!({})).await?;
        Ok(page.results.unwrap_or_default())
    }

    /// Walks `candidate.list` (one record per person) until the cursor runs out.
    pub async fn list_candidates(&self) -> Result<Vec<AshbyCandidate>, AshbyError> {
        let mut all: Vec<RawCandidate> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "limit": PAGE_LIMIT });
            if let Some(c) = &cursor {
                body["cursor"] = json!(c);
            }
            let page: Page<Vec<RawCandidate>> = self.post("/candidate.list", body).await?;
            all.extend(page.results.unwrap_or_default());

            match page.next_cursor {
                Some(next) if all.len() < MAX_LISTED_CANDIDATES => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Listed {} Ashby candidates", all.len());
        Ok(all.into_iter().map(candidate_from_person).collect())
    }

    /// One page of open applications (hired and archived are excluded).
    pub async fn list_applications(
        &self,
        job_id: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<(Vec<AshbyCandidate>, Option<String>), AshbyError> {
        let mut body = json!({ "limit": limit.unwrap_or(PAGE_LIMIT) });
        if let Some(job_id) = job_id {
            body["jobId"] = json!(job_id);
        }
        if let Some(cursor) = cursor {
            body["cursor"] = json!(cursor);
        }

        let page: Page<Vec<RawApplication>> = self.post("/application.list", body).await?;
        let candidates = page
            .results
            .unwrap_or_default()
            .into_iter()
            .filter(RawApplication::is_open)
            .filter_map(candidate_from_application)
            .collect();

        Ok((candidates, page.next_cursor))
    }

    /// Candidate profile plus job and stage from their first application, when readable.
    pub async fn get_candidate(&self, candidate_id: &str) -> Result<AshbyCandidate, AshbyError> {
        let page: Page<RawCandidate> = self
            .post("/candidate.info", json!({ "id": candidate_id }))
            .await?;
        let raw = page
            .results
            .ok_or_else(|| AshbyError::Rejected(format!("candidate {candidate_id} not found")))?;

        let mut candidate = AshbyCandidate {
            id: raw.id.clone(),
            name: raw.name.clone(),
            email: raw.email(),
            application_id: raw.application_ids.first().cloned(),
            job_title: None,
            job_id: None,
            current_stage: None,
            current_stage_id: None,
        };

        if let Some(application_id) = candidate.application_id.clone() {
            match self
                .post::<RawApplication>("/application.info", json!({ "id": application_id }))
                .await
            {
                Ok(Page {
                    results: Some(app),
                    ..
                }) => apply_application(&mut candidate, &app),
                Ok(_) => {}
                Err(e) => warn!("application.info for {application_id} failed: {e}"),
            }
        }

        Ok(candidate)
    }

    /// Finds a candidate from an email address or anything containing their Ashby id
    /// (e.g. a pasted profile URL).
    pub async fn find_candidate(&self, query: &str) -> Result<Option<AshbyCandidate>, AshbyError> {
        let query = query.trim();

        if let Some(candidate_id) = extract_uuid(query) {
            match self
                .post::<RawCandidate>("/candidate.info", json!({ "id": candidate_id }))
                .await
            {
                Ok(Page {
                    results: Some(raw), ..
                }) => return self.with_best_application(raw).await.map(Some),
                Ok(_) => {}
                Err(e) => debug!("candidate.info lookup for {candidate_id} missed: {e}"),
            }
        }

        let email = query.to_lowercase();

        match self
            .post::<RawCandidate>("/candidate.search", json!({ "email": email }))
            .await
        {
            Ok(Page {
                results: Some(raw), ..
            }) => return self.with_best_application(raw).await.map(Some),
            Ok(_) => {}
            Err(e) => debug!("candidate.search for {email} missed: {e}"),
        }

        let mut cursor: Option<String> = None;
        for _ in 0..MAX_SCAN_PAGES {
            let mut body = json!({ "limit": PAGE_LIMIT });
            if let Some(c) = &cursor {
                body["cursor"] = json!(c);
            }
            let page: Page<Vec<RawApplication>> = self.post("/application.list", body).await?;
            let apps = page.results.unwrap_or_default();
            if apps.is_empty() {
                break;
            }

            if let Some(app) = apps.into_iter().find(|a| application_matches_email(a, &email)) {
                return Ok(candidate_from_application(app));
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(None)
    }

    /// Stages of the job's default interview plan (else its first plan).
    pub async fn get_interview_stages(&self, job_id: &str) -> Result<Vec<InterviewStage>, AshbyError> {
        let job: Page<RawJobInfo> = self.post("/job.info", json!({ "id": job_id })).await?;
        let plan_id = job.results.and_then(|j| {
            j.default_interview_plan_id
                .or_else(|| j.interview_plan_ids.into_iter().next())
        });
        let Some(plan_id) = plan_id else {
            debug!("Job {job_id} has no interview plan");
            return Ok(Vec::new());
        };

        let page: Page<Value> = self
            .post("/interviewStage.list", json!({ "interviewPlanId": plan_id }))
            .await?;
        Ok(page
            .results
            .map(|results| parse_interview_stages(&results))
            .unwrap_or_default())
    }

    /// Availability windows the candidate submitted for this application.
    pub async fn get_candidate_availability(
        &self,
        application_id: &str,
    ) -> Result<Vec<TimeWindow>, AshbyError> {
        let page: Page<Vec<RawSchedule>> = self
            .post(
                "/interviewSchedule.list",
                json!({ "applicationId": application_id }),
            )
            .await?;
        Ok(availability_windows(page.results.unwrap_or_default()))
    }

    async fn with_best_application(&self, raw: RawCandidate) -> Result<AshbyCandidate, AshbyError> {
        let page: Page<Vec<RawApplication>> = self
            .post(
                "/application.list",
                json!({ "candidateId": raw.id, "limit": 50 }),
            )
            .await?;
        let apps = page.results.unwrap_or_default();

        let mut candidate = candidate_from_person(raw);
        candidate.application_id = None;
        if let Some(app) = pick_application(&apps) {
            candidate.application_id = Some(app.id.clone());
            apply_application(&mut candidate, app);
        }
        Ok(candidate)
    }

    /// Sends an RPC call, retrying 429/5xx and transport errors with exponential backoff.
    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<Page<T>, AshbyError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut last_error: Option<AshbyError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Ashby {} attempt {} failed, retrying after {}ms...",
                    endpoint,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .basic_auth(&self.config.api_key, Some(""))
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AshbyError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                warn!("Ashby {} returned {}: {}", endpoint, status, text);
                last_error = Some(AshbyError::Api {
                    status: status.as_u16(),
                    message: text,
                });
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(AshbyError::Api {
                    status: status.as_u16(),
                    message: text,
                });
            }

            let envelope: Envelope = response.json().await?;
            return decode_envelope(envelope);
        }

        Err(last_error.unwrap_or(AshbyError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl CandidateAvailability for AshbyClient {
    async fn candidate_windows(&self, application_id: &str) -> Result<Vec<TimeWindow>, AppError> {
        Ok(self.get_candidate_availability(application_id).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mapping helpers
// ────────────────────────────────────────────────────────────────────────────

fn decode_envelope<T: DeserializeOwned>(envelope: Envelope) -> Result<Page<T>, AshbyError> {
    if !envelope.success {
        let message = if envelope.errors.is_empty() {
            "Unknown error".to_string()
        } else {
            envelope
                .errors
                .iter()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(AshbyError::Rejected(message));
    }

    let results = match envelope.results {
        Some(Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };

    Ok(Page {
        results,
        next_cursor: envelope.next_cursor,
    })
}

/// Person-level record; the most recent application id is the last listed.
fn candidate_from_person(raw: RawCandidate) -> AshbyCandidate {
    AshbyCandidate {
        email: raw.email(),
        application_id: raw.application_ids.last().cloned(),
        id: raw.id,
        name: raw.name,
        job_title: None,
        job_id: None,
        current_stage: None,
        current_stage_id: None,
    }
}

fn candidate_from_application(app: RawApplication) -> Option<AshbyCandidate> {
    let person = app.candidate.as_ref()?;
    let mut candidate = AshbyCandidate {
        id: person.id.clone(),
        name: person.name.clone(),
        email: person.email(),
        application_id: Some(app.id.clone()),
        job_title: None,
        job_id: None,
        current_stage: None,
        current_stage_id: None,
    };
    apply_application(&mut candidate, &app);
    Some(candidate)
}

fn apply_application(candidate: &mut AshbyCandidate, app: &RawApplication) {
    candidate.job_title = app.job.as_ref().map(|j| j.title.clone());
    candidate.job_id = app.job.as_ref().map(|j| j.id.clone());
    candidate.current_stage = app.current_interview_stage.as_ref().map(|s| s.title.clone());
    candidate.current_stage_id = app.current_interview_stage.as_ref().map(|s| s.id.clone());
}

/// Active, then Lead, then any open application, then whatever comes first.
fn pick_application(apps: &[RawApplication]) -> Option<&RawApplication> {
    apps.iter()
        .find(|a| a.status == "Active")
        .or_else(|| apps.iter().find(|a| a.status == "Lead"))
        .or_else(|| apps.iter().find(|a| a.is_open()))
        .or_else(|| apps.first())
}

fn application_matches_email(app: &RawApplication, email: &str) -> bool {
    app.candidate
        .as_ref()
        .and_then(|c| c.primary_email_address.as_ref())
        .map(|e| e.value.to_lowercase() == email)
        .unwrap_or(false)
}

/// First hyphenated UUID anywhere in `input`, lower-cased.
fn extract_uuid(input: &str) -> Option<String> {
    const LEN: usize = 36;
    (0..input.len().saturating_sub(LEN - 1))
        .filter(|&i| input.is_char_boundary(i) && input.is_char_boundary(i + LEN))
        .find_map(|i| Uuid::try_parse(&input[i..i + LEN]).ok())
        .map(|id| id.hyphenated().to_string())
}

fn availability_windows(schedules: Vec<RawSchedule>) -> Vec<TimeWindow> {
    schedules
        .into_iter()
        .flat_map(|s| s.availability_windows)
        .filter_map(|w| match TimeWindow::new(w.start_time, w.end_time) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!("Dropping candidate availability window: {e}");
                None
            }
        })
        .collect()
}
