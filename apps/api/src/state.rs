use sqlx::PgPool;

use crate::ashby_client::AshbyClient;
use crate::calendar_client::CalendarClient;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ashby: AshbyClient,
    /// Google Calendar and Workspace Directory.
    pub calendar: CalendarClient,
    pub config: Config,
}
