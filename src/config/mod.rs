//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Re-login after this many seconds even if the token is still valid
    #[serde(default = "default_auth_refresh_secs")]
    pub auth_refresh_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_event_log_path")]
    pub event_log_path: String,
    #[serde(default = "default_error_dir")]
    pub error_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            auth_refresh_secs: default_auth_refresh_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            backoff: default_backoff(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            event_log_path: default_event_log_path(),
            error_dir: default_error_dir(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            base_url: default_base_url(),
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_auth_refresh_secs() -> u64 {
    3600
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff() -> f64 {
    1.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_event_log_path() -> String {
    "log.txt".to_string()
}

fn default_error_dir() -> String {
    "error_logs".to_string()
}

fn default_auth_url() -> String {
    "https://auth.tado.com".to_string()
}

fn default_base_url() -> String {
    "https://my.tado.com".to_string()
}

fn default_client_id() -> String {
    "tado-web-app".to_string()
}

// Public secret shipped with the tado web app
fn default_client_secret() -> String {
    "wZaRN7rpjn3FoNyF5IFuxg9uMzYJcvOoQ8QWiIqS3hfk6gLhVlG57j5YNoZL2Rtc".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Clamped to the largest span chrono can represent
    pub fn auth_refresh(&self) -> chrono::Duration {
        let max_secs = chrono::Duration::max_value().num_seconds();
        let secs = i64::try_from(self.auth_refresh_secs).unwrap_or(i64::MAX).min(max_secs);
        chrono::Duration::seconds(secs)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.initial_delay_ms),
            self.backoff,
            Duration::from_millis(self.max_delay_ms),
            self.max_attempts,
        )
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load from an optional file (`config/default` unless overridden) and
    /// `TADO_PRESENCE__*` environment variables
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name("config/default").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("TADO_PRESENCE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }
}
