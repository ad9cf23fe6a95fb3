use std::path::PathBuf;

use crate::error::ConfigError;

/// Process configuration for the Print Bullet daemon loaded from environment variables.
///
/// These values describe where things live (printer API, settings file) and
/// how the daemon polls. The user facing notification settings are kept in
/// the settings file instead, see [`crate::settings::Settings`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Moonraker API URL used to follow the print job.
    ///
    /// This should point to the Moonraker API endpoint (typically on port 7125).
    /// Only needed to watch the printer, see [`Config::require_moonraker_api_url`].
    /// Environment variable: `MOONRAKER_API_URL`
    pub moonraker_api_url: Option<String>,

    /// Path of the JSON settings file.
    ///
    /// The file is re-read whenever its modification time changes.
    /// Environment variable: `SETTINGS_FILE`
    pub settings_file: PathBuf,

    /// Base URL of the Pushbullet API.
    /// Environment variable: `PUSHBULLET_API_URL`
    pub pushbullet_api_url: String,

    /// Seconds between two printer status polls.
    /// Environment variable: `POLL_INTERVAL_SECONDS`
    pub poll_interval_seconds: u64,

    /// Upper bound for every outgoing HTTP request, in seconds.
    /// Environment variable: `REQUEST_TIMEOUT_SECONDS`
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `POLL_INTERVAL_SECONDS` or `REQUEST_TIMEOUT_SECONDS`
    /// is not a number. Variables read:
    /// - `MOONRAKER_API_URL`: Moonraker API URL (required for watching the printer)
    /// - `SETTINGS_FILE`: Settings file path (default: "./settings.json")
    /// - `PUSHBULLET_API_URL`: Pushbullet API base (default: "https://api.pushbullet.com/v2")
    /// - `POLL_INTERVAL_SECONDS`: Printer poll interval (default: "5")
    /// - `REQUEST_TIMEOUT_SECONDS`: HTTP timeout (default: "10")
    pub fn load() -> Result<Self, ConfigError> {
        let moonraker_api_url = std::env::var("MOONRAKER_API_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let settings_file = PathBuf::from(
            std::env::var("SETTINGS_FILE").unwrap_or_else(|_| "./settings.json".to_string()),
        );

        let pushbullet_api_url = std::env::var("PUSHBULLET_API_URL")
            .unwrap_or_else(|_| constants::PUSHBULLET_API_URL.to_string());

        let poll_interval_seconds = parse_env_u64(
            "POLL_INTERVAL_SECONDS",
            constants::DEFAULT_POLL_INTERVAL_SECONDS,
        )?;

        let request_timeout_seconds = parse_env_u64(
            "REQUEST_TIMEOUT_SECONDS",
            constants::DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            moonraker_api_url,
            settings_file,
            pushbullet_api_url: pushbullet_api_url.trim_end_matches('/').to_string(),
            poll_interval_seconds,
            request_timeout_seconds,
        })
    }

    /// The Moonraker API URL, which only the monitoring loop needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if `MOONRAKER_API_URL` is not set.
    pub fn require_moonraker_api_url(&self) -> Result<&str, ConfigError> {
        self.moonraker_api_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar {
                var_name: "MOONRAKER_API_URL".to_string(),
            })
    }
}

fn parse_env_u64(var_name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                field: var_name.to_string(),
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Application constants used throughout the system.
pub mod constants {
    /// Moonraker on the local machine, its usual location.
    pub const DEFAULT_MOONRAKER_API_URL: &str = "http://localhost:7125";

    /// Default Pushbullet API endpoint.
    pub const PUSHBULLET_API_URL: &str = "https://api.pushbullet.com/v2";

    /// Default delay between printer status polls in seconds.
    pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;

    /// Default timeout for HTTP requests in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

    /// Default spacing between periodic progress updates, in minutes.
    pub const DEFAULT_PERIODIC_INTERVAL_MINUTES: i64 = 15;

    /// Longest accepted spacing between periodic updates, one year in minutes.
    pub const MAX_PERIODIC_INTERVAL_MINUTES: i64 = 365 * 24 * 60;

    /// Body used by the test command when none is given.
    pub const TEST_MESSAGE_BODY: &str = "Testing, 1, 2, 3, 4...";

    /// Title used by the test command.
    pub const TEST_MESSAGE_TITLE: &str = "Test from Print Bullet";

    pub const SECONDS_PER_DAY: i64 = 86400;
    pub const SECONDS_PER_HOUR: i64 = 3600;
    pub const SECONDS_PER_MINUTE: i64 = 60;
}
