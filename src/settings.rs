use log::{error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::config::constants::{
    DEFAULT_PERIODIC_INTERVAL_MINUTES, MAX_PERIODIC_INTERVAL_MINUTES, SECONDS_PER_MINUTE,
};
use crate::error::ConfigError;

/// A `{title, body}` pair of format strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Template for the "job done" notification.
    ///
    /// Placeholders: `file` (without extension), `elapsed_time`.
    pub fn default_print_done() -> Self {
        Self::new("Print job finished", "{file} finished printing in {elapsed_time}")
    }

    /// Template for periodic progress updates.
    ///
    /// Placeholders: `progress`, `file`, `elapsed_time`, `remaining_time`, `eta`.
    pub fn default_print_progress() -> Self {
        Self::new(
            "Print job {progress}% complete",
            "{progress}% on {file}\nTime elapsed: {elapsed_time}\nTime left: {remaining_time}\nETA: {eta}",
        )
    }

    fn merge(&mut self, data: &Value, key: &str) {
        let Some(obj) = data.as_object() else {
            warn!("Ignoring non-object value for {}", key);
            return;
        };
        if let Some(title) = obj.get("title").and_then(Value::as_str) {
            self.title = title.to_string();
        }
        if let Some(body) = obj.get("body").and_then(Value::as_str) {
            self.body = body.to_string();
        }
    }
}

/// Webcam settings used when attaching a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebcamSettings {
    /// URL returning a single still image.
    pub snapshot: Option<String>,
    pub flip_h: bool,
    pub flip_v: bool,
    /// Rotate 90 degrees counter clockwise.
    pub rotate90: bool,
    /// Path to an ffmpeg executable used for flipping and rotating.
    pub ffmpeg: Option<String>,
}

impl WebcamSettings {
    fn merge(&mut self, data: &Value) {
        let Some(obj) = data.as_object() else {
            warn!("Ignoring non-object value for webcam");
            return;
        };
        if let Some(value) = obj.get("snapshot") {
            self.snapshot = non_empty_string(value);
        }
        if let Some(value) = obj.get("ffmpeg") {
            self.ffmpeg = non_empty_string(value);
        }
        merge_bool(obj, "flipH", &mut self.flip_h);
        merge_bool(obj, "flipV", &mut self.flip_v);
        merge_bool(obj, "rotate90", &mut self.rotate90);
    }
}

/// Notification settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub access_token: Option<String>,
    pub push_channel: Option<String>,
    pub periodic_updates: bool,
    /// Interval between periodic updates in minutes, never negative.
    pub periodic_updates_interval: i64,
    #[serde(rename = "printDone")]
    pub print_done: MessageTemplate,
    #[serde(rename = "printProgress")]
    pub print_progress: MessageTemplate,
    pub webcam: WebcamSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_token: None,
            push_channel: None,
            periodic_updates: false,
            periodic_updates_interval: DEFAULT_PERIODIC_INTERVAL_MINUTES,
            print_done: MessageTemplate::default_print_done(),
            print_progress: MessageTemplate::default_print_progress(),
            webcam: WebcamSettings::default(),
        }
    }
}

impl Settings {
    /// Build settings from a JSON document, starting from the defaults.
    pub fn from_value(data: &Value) -> Self {
        let mut settings = Settings::default();
        settings.apply_update(data);
        settings
    }

    /// Load settings from a JSON file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(
                "Settings file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Settings::default());
        }
        Ok(Settings::from_value(&read_json(path)?))
    }

    /// Write the settings to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file_error = |reason: String| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| file_error(e.to_string()))?;
        fs::write(path, json).map_err(|e| file_error(e.to_string()))
    }

    /// Merge a (partial) settings document into these settings.
    ///
    /// `periodic_updates_interval` accepts numbers and numeric strings. It is
    /// clamped to `0..=MAX_PERIODIC_INTERVAL_MINUTES` and anything unparseable
    /// is logged and ignored. Empty `access_token`/`push_channel` values clear the setting.
    /// Unknown keys are ignored.
    pub fn apply_update(&mut self, data: &Value) {
        let Some(obj) = data.as_object() else {
            warn!("Ignoring settings update that is not a JSON object");
            return;
        };

        if let Some(value) = obj.get("access_token") {
            self.access_token = non_empty_string(value);
        }
        if let Some(value) = obj.get("push_channel") {
            self.push_channel = non_empty_string(value);
        }
        merge_bool(obj, "periodic_updates", &mut self.periodic_updates);

        if let Some(value) = obj.get("periodic_updates_interval") {
            match coerce_interval(value) {
                Some(minutes) => self.periodic_updates_interval = minutes,
                None => error!(
                    "Got an invalid value to save for periodic_updates_interval, ignoring it: {}",
                    value
                ),
            }
        }

        if let Some(value) = obj.get("printDone") {
            self.print_done.merge(value, "printDone");
        }
        if let Some(value) = obj.get("printProgress") {
            self.print_progress.merge(value, "printProgress");
        }
        if let Some(value) = obj.get("webcam") {
            self.webcam.merge(value);
        }
    }

    /// Periodic update interval in seconds.
    pub fn interval_seconds(&self) -> i64 {
        self.periodic_updates_interval
            .clamp(0, MAX_PERIODIC_INTERVAL_MINUTES)
            .saturating_mul(SECONDS_PER_MINUTE)
    }

    /// A copy with the credential fields blanked, safe to show to non-admins.
    pub fn redacted(&self) -> Self {
        Self {
            access_token: None,
            push_channel: None,
            ..self.clone()
        }
    }
}

/// Watches the settings file for saves by comparing modification times.
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl SettingsFile {
    /// Start watching `path`; its current state counts as already seen.
    pub fn new(path: PathBuf) -> Self {
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the file contents if it changed since the last call.
    ///
    /// Unreadable or invalid files are logged and skipped until they change again.
    pub fn poll_changes(&mut self) -> Option<Value> {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return None;
        }
        self.last_modified = current;

        match read_json(&self.path) {
            Ok(data) => {
                info!("Settings file {} changed, reloading", self.path.display());
                Some(data)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let file_error = |reason: String| ConfigError::FileReadError {
        path: path.display().to_string(),
        reason,
    };
    let contents = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| file_error(e.to_string()))
}

fn coerce_interval(value: &Value) -> Option<i64> {
    let minutes = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(minutes.clamp(0, MAX_PERIODIC_INTERVAL_MINUTES))
}

fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn merge_bool(obj: &Map<String, Value>, key: &str, target: &mut bool) {
    match obj.get(key) {
        None => {}
        Some(Value::Bool(b)) => *target = *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => *target = true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => *target = false,
        Some(other) => warn!("Ignoring invalid boolean for {}: {}", key, other),
    }
}
