mod admin;
mod ashby_client;
mod calendar_client;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod scheduling;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ashby_client::AshbyClient;
use crate::calendar_client::{CalendarClient, GoogleAuth};
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scheduler API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize Ashby client
    let ashby = AshbyClient::new(config.ashby_config())?;
    info!("Ashby client initialized ({})", config.ashby_api_base);

    // Initialize Google Calendar / Directory client
    let calendar_config = config.calendar_config();
    let auth_source = match calendar_config.auth {
        GoogleAuth::Static(_) => "static token",
        GoogleAuth::MetadataServer => "metadata server",
    };
    let calendar = CalendarClient::new(calendar_config)?;
    info!("Calendar client initialized (auth: {auth_source})");

    info!(
        "Scheduling look-ahead: {} days; directory sync domain: {}",
        config.look_ahead_days,
        config.google_workspace_domain.as_deref().unwrap_or("<unset>")
    );

    // Build app state
    let state = AppState {
        db,
        ashby,
        calendar,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the admin UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
