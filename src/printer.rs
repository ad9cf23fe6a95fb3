use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::PrinterError;

/// Print state as reported by Klipper's `print_stats` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterState {
    Standby,
    Printing,
    Paused,
    Complete,
    Cancelled,
    Error,
    Unknown(String),
}

impl PrinterState {
    pub fn parse(state: &str) -> Self {
        match state {
            "standby" => PrinterState::Standby,
            "printing" => PrinterState::Printing,
            "paused" => PrinterState::Paused,
            "complete" => PrinterState::Complete,
            "cancelled" => PrinterState::Cancelled,
            "error" => PrinterState::Error,
            other => PrinterState::Unknown(other.to_string()),
        }
    }

    /// Whether a job is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, PrinterState::Printing | PrinterState::Paused)
    }
}

/// Snapshot of the current job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: PrinterState,
    pub file_path: Option<String>,
    /// Completion from 0.0 to 1.0.
    pub progress: f64,
    /// Seconds spent printing, `None` until printing has actually begun.
    pub elapsed_seconds: Option<i64>,
    /// Estimated seconds left, `None` until there is progress to extrapolate from.
    pub remaining_seconds: Option<i64>,
}

impl JobStatus {
    /// Parse a `/printer/objects/query?print_stats&virtual_sdcard` response.
    ///
    /// The remaining time is extrapolated linearly from elapsed time and
    /// file progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries no `print_stats.state`.
    pub fn from_moonraker(status: &Value) -> Result<Self, PrinterError> {
        let objects = &status["result"]["status"];
        let stats = &objects["print_stats"];

        let state = stats["state"]
            .as_str()
            .map(PrinterState::parse)
            .ok_or_else(|| PrinterError::MalformedResponse {
                reason: "missing print_stats.state".to_string(),
            })?;

        let file_path = stats["filename"]
            .as_str()
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned);

        let progress = objects["virtual_sdcard"]["progress"]
            .as_f64()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        let elapsed_seconds = stats["print_duration"]
            .as_f64()
            .filter(|duration| *duration > 0.0)
            .map(|duration| duration.floor() as i64);

        let remaining_seconds = elapsed_seconds
            .filter(|_| progress > 0.0)
            .map(|elapsed| (elapsed as f64 / progress - elapsed as f64).round() as i64);

        Ok(Self {
            state,
            file_path,
            progress,
            elapsed_seconds,
            remaining_seconds,
        })
    }

    /// Whole percent complete, 0 to 100.
    pub fn percent(&self) -> u8 {
        (self.progress * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// The printer host: exposes the job currently in flight.
pub trait PrintHost: Send + Sync {
    fn current_job(&self) -> Result<JobStatus, PrinterError>;
}

/// Printer status service for the Moonraker API.
pub struct MoonrakerHost {
    pub api_url: String,
    client: Client,
}

impl MoonrakerHost {
    /// Create a new MoonrakerHost with the provided Moonraker API URL.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL for the Moonraker API (e.g., "http://printer.local:7125")
    /// * `timeout` - Upper bound for each status request
    pub fn new(api_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_url, client }
    }

    /// Get the raw printer status.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - The Moonraker API returns an error status
    /// - JSON parsing fails
    pub fn get_printer_status(&self) -> Result<Value, PrinterError> {
        let endpoint = format!(
            "{}/printer/objects/query?print_stats&virtual_sdcard",
            self.api_url
        );
        let response =
            self.client
                .get(&endpoint)
                .send()
                .map_err(|e| PrinterError::ConnectionFailed {
                    api_url: self.api_url.clone(),
                    reason: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(PrinterError::ApiError {
                endpoint,
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        response.json().map_err(|e| PrinterError::MalformedResponse {
            reason: e.to_string(),
        })
    }
}

impl PrintHost for MoonrakerHost {
    fn current_job(&self) -> Result<JobStatus, PrinterError> {
        JobStatus::from_moonraker(&self.get_printer_status()?)
    }
}
