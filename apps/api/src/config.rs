use anyhow::{Context, Result};

use crate::ashby_client::AshbyConfig;
use crate::calendar_client::{CalendarConfig, GoogleAuth};
use crate::scheduling::pipeline::DEFAULT_LOOK_AHEAD_DAYS;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub ashby_api_key: String,
    pub ashby_api_base: String,
    pub google_calendar_base: String,
    pub google_directory_base: String,
    /// Bearer token for Google APIs; the metadata server is used when unset.
    pub google_access_token: Option<String>,
    /// Only needed by directory user sync.
    pub google_workspace_domain: Option<String>,
    pub look_ahead_days: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            ashby_api_key: require_env("ASHBY_API_KEY")?,
            ashby_api_base: env_or("ASHBY_API_BASE", "https://api.ashbyhq.com"),
            google_calendar_base: env_or("GOOGLE_CALENDAR_BASE", "https://www.googleapis.com"),
            google_directory_base: env_or("GOOGLE_DIRECTORY_BASE", "https://admin.googleapis.com"),
            google_access_token: optional_env("GOOGLE_ACCESS_TOKEN"),
            google_workspace_domain: optional_env("GOOGLE_WORKSPACE_DOMAIN"),
            look_ahead_days: env_or("LOOK_AHEAD_DAYS", &DEFAULT_LOOK_AHEAD_DAYS.to_string())
                .parse::<u32>()
                .context("LOOK_AHEAD_DAYS must be a whole number of days")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    pub fn ashby_config(&self) -> AshbyConfig {
        AshbyConfig {
            api_key: self.ashby_api_key.clone(),
            base_url: self.ashby_api_base.clone(),
        }
    }

    pub fn calendar_config(&self) -> CalendarConfig {
        CalendarConfig {
            calendar_base: self.google_calendar_base.clone(),
            directory_base: self.google_directory_base.clone(),
            auth: match &self.google_access_token {
                Some(token) => GoogleAuth::Static(token.clone()),
                None => GoogleAuth::MetadataServer,
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> Config {
        Config {
            database_url: "postgres://localhost/scheduler".into(),
            ashby_api_key: "key".into(),
            ashby_api_base: "https://api.ashbyhq.com".into(),
            google_calendar_base: "https://www.googleapis.com".into(),
            google_directory_base: "https://admin.googleapis.com".into(),
            google_access_token: token.map(str::to_string),
            google_workspace_domain: None,
            look_ahead_days: DEFAULT_LOOK_AHEAD_DAYS,
            port: 8080,
            rust_log: "info".into(),
        }
    }

    #[test]
    fn test_static_token_selects_static_auth() {
        let auth = config(Some("ya29.token")).calendar_config().auth;
        assert!(matches!(auth, GoogleAuth::Static(ref t) if t == "ya29.token"));
    }

    #[test]
    fn test_missing_token_falls_back_to_metadata_server() {
        let auth = config(None).calendar_config().auth;
        assert!(matches!(auth, GoogleAuth::MetadataServer));
    }

    #[test]
    fn test_ashby_config_carries_key_and_base() {
        let ashby = config(None).ashby_config();
        assert_eq!(ashby.api_key, "key");
        assert_eq!(ashby.base_url, "https://api.ashbyhq.com");
    }
}
