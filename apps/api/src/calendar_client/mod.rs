/// Calendar Client: the single point of entry for Google Calendar and
/// Workspace Directory calls.
///
/// Free/busy and event creation back the scheduling pipeline through the
/// `BusyCalendar` trait; the directory listing feeds interviewer sync.
/// Credentials and base URLs arrive through `CalendarConfig`, never globals.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::scheduling::models::TimeWindow;
use crate::scheduling::sources::{BusyCalendar, NewCalendarEvent};

pub mod handlers;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const MAX_RETRIES: u32 = 3;
const DIRECTORY_PAGE_SIZE: u32 = 500;
/// Refresh metadata tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: StdDuration = StdDuration::from_secs(60);

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Access token unavailable: {0}")]
    Auth(String),

    #[error("Created event has no id")]
    MissingEventId,

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

impl From<CalendarError> for AppError {
    fn from(err: CalendarError) -> Self {
        AppError::UpstreamUnavailable(format!("Google Calendar: {err}"))
    }
}

/// Where OAuth access tokens come from. The token must already carry access to every
/// organizer's calendar; per-organizer impersonation is not done here.
#[derive(Debug, Clone)]
pub enum GoogleAuth {
    /// A pre-issued bearer token (e.g. minted by a sidecar with delegated scopes).
    Static(String),
    /// The GCE/GKE metadata server's default service account.
    MetadataServer,
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub calendar_base: String,
    pub directory_base: String,
    pub auth: GoogleAuth,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    time_zone: &'a str,
    items: Vec<FreeBusyItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, CalendarBusy>,
}

#[derive(Debug, Deserialize)]
struct CalendarBusy {
    #[serde(default)]
    busy: Vec<BusyPeriod>,
    #[serde(default)]
    errors: Vec<CalendarLookupError>,
}

#[derive(Debug, Deserialize)]
struct BusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CalendarLookupError {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    start: EventTime,
    end: EventTime,
    attendees: Vec<EventAttendee<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: DateTime<Utc>,
    time_zone: &'static str,
}

#[derive(Debug, Serialize)]
struct EventAttendee<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryPage {
    #[serde(default)]
    users: Vec<DirectoryUserRecord>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryUserRecord {
    primary_email: Option<String>,
    name: Option<DirectoryName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryName {
    full_name: Option<String>,
}

/// A Workspace user eligible to become an interviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryUser {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CalendarClient {
    client: Client,
    config: Arc<CalendarConfig>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl CalendarClient {
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        Ok(Self {
            client: Client::builder()
                .timeout(StdDuration::from_secs(30))
                .build()?,
            config: Arc::new(config),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Busy intervals per email over `horizon`, in one batched freeBusy query.
    /// Emails the provider omits or cannot read map to an empty list (assumed free).
    pub async fn free_busy(
        &self,
        emails: &[String],
        horizon: TimeWindow,
    ) -> Result<HashMap<String, Vec<TimeWindow>>, CalendarError> {
        if emails.is_empty() {
            return Ok(HashMap::new());
        }

        let body = FreeBusyRequest {
            time_min: horizon.start,
            time_max: horizon.end,
            time_zone: "UTC",
            items: emails.iter().map(|e| FreeBusyItem { id: e }).collect(),
        };
        let url = build_url(&self.config.calendar_base, &["calendar", "v3", "freeBusy"])?;

        let response: FreeBusyResponse = self
            .execute(|| self.client.request(Method::POST, url.clone()).json(&body))
            .await?;

        Ok(busy_map_from_response(emails, response))
    }

    /// Inserts an event on the organizer's calendar and notifies attendees.
    pub async fn create_event(&self, event: &NewCalendarEvent) -> Result<String, CalendarError> {
        let body = EventRequest {
            summary: &event.title,
            description: event.description.as_deref(),
            location: event.location.as_deref(),
            start: EventTime {
                date_time: event.start,
                time_zone: "UTC",
            },
            end: EventTime {
                date_time: event.end,
                time_zone: "UTC",
            },
            attendees: event
                .attendee_emails
                .iter()
                .map(|email| EventAttendee { email })
                .collect(),
        };
        let url = build_url(
            &self.config.calendar_base,
            &[
                "calendar",
                "v3",
                "calendars",
                &event.organizer_email,
                "events",
            ],
        )?;

        let response: EventResponse = self
            .execute(|| {
                self.client
                    .request(Method::POST, url.clone())
                    .query(&[("sendUpdates", "all")])
                    .json(&body)
            })
            .await?;

        let id = response.id.ok_or(CalendarError::MissingEventId)?;
        debug!("Created calendar event {id} for {}", event.organizer_email);
        Ok(id)
    }

    /// Every active Workspace user in `domain` that has both an email and a full name.
    pub async fn list_directory_users(
        &self,
        domain: &str,
    ) -> Result<Vec<DirectoryUser>, CalendarError> {
        let url = build_url(
            &self.config.directory_base,
            &["admin", "directory", "v1", "users"],
        )?;
        let page_size = DIRECTORY_PAGE_SIZE.to_string();

        let mut users = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: DirectoryPage = self
                .execute(|| {
                    let mut request = self.client.request(Method::GET, url.clone()).query(&[
                        ("domain", domain),
                        ("maxResults", page_size.as_str()),
                        ("orderBy", "givenName"),
                        ("projection", "basic"),
                        ("query", "isSuspended=false"),
                    ]);
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            users.extend(directory_users_from_page(page.users));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Fetched {} directory users for {domain}", users.len());
        Ok(users)
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        match &self.config.auth {
            GoogleAuth::Static(token) => Ok(token.clone()),
            GoogleAuth::MetadataServer => {
                let mut cached = self.token.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let response = self
                    .client
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(CalendarError::Auth(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }
                let fresh: MetadataToken = response.json().await?;
                let lifetime = StdDuration::from_secs(fresh.expires_in)
                    .saturating_sub(TOKEN_REFRESH_MARGIN);
                *cached = Some(CachedToken {
                    value: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(fresh.access_token)
            }
        }
    }

    /// Sends an authenticated request, retrying 429/5xx and transport errors
    /// with exponential backoff (1s, 2s).
    async fn execute<T, F>(&self, build: F) -> Result<T, CalendarError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<CalendarError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = StdDuration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Google API attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let token = self.access_token().await?;
            let response = match build().bearer_auth(token).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CalendarError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Google API returned {}: {}", status, body);
                last_error = Some(CalendarError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(CalendarError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(CalendarError::Parse);
        }

        Err(last_error.unwrap_or(CalendarError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl BusyCalendar for CalendarClient {
    async fn busy_slots(
        &self,
        emails: &[String],
        horizon: TimeWindow,
    ) -> Result<HashMap<String, Vec<TimeWindow>>, AppError> {
        Ok(self.free_busy(emails, horizon).await?)
    }

    async fn create_event(&self, event: &NewCalendarEvent) -> Result<String, AppError> {
        Ok(CalendarClient::create_event(self, event).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response shaping
// ────────────────────────────────────────────────────────────────────────────

fn build_url(base: &str, segments: &[&str]) -> Result<Url, CalendarError> {
    let mut url = Url::parse(base).map_err(|e| CalendarError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| CalendarError::InvalidUrl(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// One entry per requested email, in the provider's busy order.
fn busy_map_from_response(
    emails: &[String],
    mut response: FreeBusyResponse,
) -> HashMap<String, Vec<TimeWindow>> {
    emails
        .iter()
        .map(|email| {
            let slots = match response.calendars.remove(email) {
                Some(calendar) => {
                    for err in &calendar.errors {
                        warn!("freeBusy lookup for {email} reported '{}'", err.reason);
                    }
                    calendar
                        .busy
                        .into_iter()
                        .filter_map(|period| match TimeWindow::new(period.start, period.end) {
                            Ok(window) => Some(window),
                            Err(e) => {
                                warn!("Dropping busy period for {email}: {e}");
                                None
                            }
                        })
                        .collect()
                }
                None => Vec::new(),
            };
            (email.clone(), slots)
        })
        .collect()
}

fn directory_users_from_page(records: Vec<DirectoryUserRecord>) -> Vec<DirectoryUser> {
    records
        .into_iter()
        .filter_map(|record| {
            let email = record.primary_email.filter(|e| !e.is_empty())?;
            let name = record
                .name
                .and_then(|n| n.full_name)
                .filter(|n| !n.is_empty())?;
            Some(DirectoryUser { email, name })
        })
        .collect()
}
