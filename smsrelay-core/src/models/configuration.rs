//! Configuration data structures

use crate::subscription::validation::validate_subscription_name;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable pointing at the SMS provider credentials file
pub const CREDENTIALS_PATH_ENV: &str = "TWILIO_CREDS_PATH";
/// Environment variable that reroutes every outbound SMS to one destination
pub const OVERRIDE_TO_ENV: &str = "SMSRELAY_OVERRIDE_TO";
/// Environment variable holding the Pub/Sub emulator host (e.g. `localhost:8085`)
pub const PUBSUB_EMULATOR_HOST_ENV: &str = "PUBSUB_EMULATOR_HOST";
/// Environment variable holding the Pub/Sub project id
pub const PUBSUB_PROJECT_ENV: &str = "PUBSUB_PROJECT_ID";

/// Logging level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// Defaults applied to drain requests that omit an option
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainDefaults {
    /// Subscription drained when a request names none
    pub subscription_name: Option<String>,
    /// Listening window in seconds
    pub window_seconds: u64,
    /// Intake quota per session
    pub max_messages: usize,
    /// Acknowledge messages even when delivery fails
    pub always_ack: bool,
}

impl Default for DrainDefaults {
    fn default() -> Self {
        Self {
            subscription_name: None,
            window_seconds: 5,
            max_messages: 10,
            always_ack: true,
        }
    }
}

/// Outbound SMS provider settings. Secrets live in the credentials file, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    /// Path to the provider credentials JSON file
    pub credentials_path: PathBuf,
    /// Destination that replaces every message's `to` (testing / staging)
    pub override_to: Option<String>,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("secrets/twilio.json"),
            override_to: None,
        }
    }
}

/// Pub/Sub pull settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubSettings {
    /// Google Cloud project owning the subscriptions
    pub project_id: Option<String>,
    /// REST endpoint; replaced by `http://$PUBSUB_EMULATOR_HOST` when that is set
    pub endpoint: String,
    /// Name of the environment variable holding an OAuth access token
    pub access_token_env: String,
    /// Upper bound on messages requested per pull call
    pub pull_batch_size: usize,
}

impl Default for PubSubSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            endpoint: "https://pubsub.googleapis.com".to_string(),
            access_token_env: "PUBSUB_ACCESS_TOKEN".to_string(),
            pull_batch_size: 10,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Logging verbosity level
    pub log_level: LogLevel,
    /// Server bind address
    pub server_host: String,
    /// Server port number
    pub server_port: u16,
    /// Drain request defaults
    pub drain: DrainDefaults,
    /// SMS provider settings
    pub sms: SmsSettings,
    /// Pub/Sub settings
    pub pubsub: PubSubSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            drain: DrainDefaults::default(),
            sms: SmsSettings::default(),
            pubsub: PubSubSettings::default(),
        }
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Configuration = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(config_dir.join("smsrelay").join("config.toml"))
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(mut self) -> Self {
        if let Ok(path) = std::env::var(CREDENTIALS_PATH_ENV) {
            if !path.is_empty() {
                self.sms.credentials_path = PathBuf::from(path);
            }
        }
        if let Ok(to) = std::env::var(OVERRIDE_TO_ENV) {
            self.sms.override_to = Some(to).filter(|s| !s.is_empty());
        }
        if let Ok(host) = std::env::var(PUBSUB_EMULATOR_HOST_ENV) {
            if !host.is_empty() {
                self.pubsub.endpoint = format!("http://{}", host);
            }
        }
        if let Ok(project) = std::env::var(PUBSUB_PROJECT_ENV) {
            if !project.is_empty() {
                self.pubsub.project_id = Some(project);
            }
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.drain.window_seconds == 0 || self.drain.window_seconds > 540 {
            errors.push("drain.window_seconds must be between 1 and 540".to_string());
        }

        if self.drain.max_messages == 0 {
            errors.push("drain.max_messages must be at least 1".to_string());
        }

        if let Some(name) = &self.drain.subscription_name {
            if let Err(e) = validate_subscription_name(name) {
                errors.push(format!("drain.subscription_name: {}", e));
            }
        }

        if self.pubsub.pull_batch_size == 0 || self.pubsub.pull_batch_size > 1000 {
            errors.push("pubsub.pull_batch_size must be between 1 and 1000".to_string());
        }

        if url::Url::parse(&self.pubsub.endpoint).is_err() {
            errors.push("pubsub.endpoint must be a valid URL".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
