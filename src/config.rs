use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{CfError, CfResult};
use crate::usage::BillableOfferings;

/// Public OAuth client used by the cf CLI.
pub const DEFAULT_CLIENT_ID: &str = "cf";

/// Organizations excluded from billable totals unless overridden.
pub const DEFAULT_SKIP_ORGS: &str = "system";

/// Port the metrics server listens on. Defaults to `8080`.
pub const DEFAULT_PORT: u16 = 8080;

/// Minutes between refreshes in server mode.
pub const DEFAULT_REFRESH_MINUTES: u64 = 60;

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> = Lazy::new(|| {
    read_optional_env("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string())
});

/// Connection settings for the CF API, sourced from `CF_*` variables.
#[derive(Clone)]
pub struct CfCredentials {
    pub api_endpoint: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub skip_ssl_validation: bool,
    /// Overrides the app-usage host derived from `api_endpoint`.
    pub app_usage_endpoint: Option<String>,
}

impl CfCredentials {
    pub fn new(
        api_endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: String::new(),
            skip_ssl_validation: false,
            app_usage_endpoint: None,
        }
    }

    pub fn from_env() -> CfResult<Self> {
        Self::from_lookup(read_optional_env)
    }

    pub fn from_lookup<F>(lookup: F) -> CfResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(api_endpoint), Some(username), Some(password)) = (
            lookup("CF_API_ENDPOINT"),
            lookup("CF_USERNAME"),
            lookup("CF_PASSWORD"),
        ) else {
            return Err(CfError::Config(
                "CF_API_ENDPOINT, CF_USERNAME, and CF_PASSWORD environment variables are required"
                    .to_string(),
            ));
        };

        let mut credentials = Self::new(api_endpoint, username, password);
        if let Some(client_id) = lookup("CF_CLIENT_ID") {
            credentials.client_id = client_id;
            credentials.client_secret = lookup("CF_CLIENT_SECRET").unwrap_or_default();
        }
        credentials.skip_ssl_validation = lookup("CF_SKIP_SSL_VALIDATION")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        credentials.app_usage_endpoint = lookup("CF_APP_USAGE_ENDPOINT")
            .map(|value| value.trim_end_matches('/').to_string());
        Ok(credentials)
    }

    pub fn uses_custom_client(&self) -> bool {
        self.client_id != DEFAULT_CLIENT_ID
    }
}

impl std::fmt::Debug for CfCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfCredentials")
            .field("api_endpoint", &self.api_endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("skip_ssl_validation", &self.skip_ssl_validation)
            .field("app_usage_endpoint", &self.app_usage_endpoint)
            .finish()
    }
}

/// Inputs that shape a collection run.
#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub skip_org_names: HashSet<String>,
    pub verbose: bool,
    pub refresh_interval: Duration,
    pub billable_offerings: BillableOfferings,
    /// Reload plans and offerings before each scheduled run.
    pub reload_catalog: bool,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            skip_org_names: parse_skip_orgs(DEFAULT_SKIP_ORGS),
            verbose: false,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_MINUTES * 60),
            billable_offerings: BillableOfferings::default(),
            reload_catalog: false,
        }
    }
}

impl UsageConfig {
    pub fn should_skip(&self, org_name: &str) -> bool {
        self.skip_org_names.contains(org_name)
    }
}

/// Converts the `--refresh-interval` minutes into a duration, rejecting zero
/// and values too large to represent in seconds.
pub fn refresh_interval_from_minutes(minutes: u64) -> CfResult<Duration> {
    if minutes == 0 {
        return Err(CfError::Config(
            "refresh interval must be at least 1 minute".to_string(),
        ));
    }
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| CfError::Config(format!("refresh interval of {minutes} minutes is too large")))
}

/// Splits a comma-separated org list, trimming entries and dropping blanks.
pub fn parse_skip_orgs(raw: &str) -> HashSet<String> {
    raw.split(',')
        .filter_map(|item| {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

pub fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes")
}

pub fn env_flag(key: &str) -> bool {
    read_optional_env(key)
        .map(|value| parse_bool(&value))
        .unwrap_or(false)
}

/// `PORT` as injected by the platform, ignored when unparsable.
pub fn env_port() -> Option<u16> {
    read_optional_env("PORT").and_then(|value| value.parse::<u16>().ok())
}

pub fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
