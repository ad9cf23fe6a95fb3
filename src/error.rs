use std::fmt;

/// Custom error types for the Print Bullet notifier.
///
/// Lower-level failures (HTTP, image processing, template rendering) are
/// mapped onto these enums so that callers can tell a bad credential apart
/// from an unknown channel or a transient network problem.

/// Errors that end a Print Bullet command.
///
/// Runtime failures of the notifier, snapshot and printer are logged where
/// they happen and never reach this type.
#[derive(Debug)]
pub enum PrintBulletError {
    /// Message template errors.
    TemplateError(TemplateError),

    /// Configuration and setup errors.
    ConfigError(ConfigError),
}

/// Errors specific to the push-notification service.
#[derive(Debug)]
pub enum NotifierError {
    /// The access token was rejected by the service.
    InvalidKey,

    /// The configured channel tag does not exist for this account.
    NoSuchChannel { channel: String },

    /// The request never produced a response (network, timeout, TLS).
    RequestFailed { endpoint: String, reason: String },

    /// The service answered with an error status.
    ApiError {
        endpoint: String,
        status: u16,
        message: String,
    },
}

/// Errors specific to snapshot capture.
#[derive(Debug)]
pub enum SnapshotError {
    /// No snapshot URL is configured.
    NotConfigured,

    /// Failed to download the still image.
    DownloadFailed { url: String, reason: String },

    /// Flipping or rotating the image failed.
    TransformFailed { reason: String },
}

/// Errors specific to the printer host API.
#[derive(Debug)]
pub enum PrinterError {
    /// Failed to connect to the printer API.
    ConnectionFailed { api_url: String, reason: String },

    /// Printer API returned an error response.
    ApiError {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The response could not be understood.
    MalformedResponse { reason: String },
}

/// Errors in user supplied message templates.
#[derive(Debug)]
pub enum TemplateError {
    /// The template could not be parsed.
    Invalid { template: String, reason: String },

    /// The template references a placeholder that does not exist.
    Render { template: String, reason: String },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Configuration file could not be read or written.
    FileReadError { path: String, reason: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for PrintBulletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintBulletError::TemplateError(e) => write!(f, "Template error: {}", e),
            PrintBulletError::ConfigError(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for NotifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierError::InvalidKey => write!(f, "Invalid Pushbullet access token"),
            NotifierError::NoSuchChannel { channel } => {
                write!(f, "Could not find channel '{}'", channel)
            }
            NotifierError::RequestFailed { endpoint, reason } => {
                write!(f, "Request to '{}' failed: {}", endpoint, reason)
            }
            NotifierError::ApiError {
                endpoint,
                status,
                message,
            } => {
                write!(
                    f,
                    "Pushbullet API error at '{}' (HTTP {}): {}",
                    endpoint, status, message
                )
            }
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::NotConfigured => write!(f, "No webcam snapshot URL configured"),
            SnapshotError::DownloadFailed { url, reason } => {
                write!(f, "Failed to download snapshot from '{}': {}", url, reason)
            }
            SnapshotError::TransformFailed { reason } => {
                write!(f, "Failed to rotate/flip snapshot: {}", reason)
            }
        }
    }
}

impl fmt::Display for PrinterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterError::ConnectionFailed { api_url, reason } => {
                write!(
                    f,
                    "Failed to connect to printer at '{}': {}",
                    api_url, reason
                )
            }
            PrinterError::ApiError {
                endpoint,
                status,
                message,
            } => {
                write!(
                    f,
                    "Printer API error at '{}' (HTTP {}): {}",
                    endpoint, status, message
                )
            }
            PrinterError::MalformedResponse { reason } => {
                write!(f, "Malformed printer status response: {}", reason)
            }
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Invalid { template, reason } => {
                write!(f, "Invalid template '{}': {}", template, reason)
            }
            TemplateError::Render { template, reason } => {
                write!(f, "Could not render template '{}': {}", template, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::FileReadError { path, reason } => {
                write!(f, "Failed to access settings file '{}': {}", path, reason)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl std::error::Error for PrintBulletError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrintBulletError::TemplateError(e) => Some(e),
            PrintBulletError::ConfigError(e) => Some(e),
        }
    }
}

impl std::error::Error for NotifierError {}
impl std::error::Error for SnapshotError {}
impl std::error::Error for PrinterError {}
impl std::error::Error for TemplateError {}
impl std::error::Error for ConfigError {}

impl From<TemplateError> for PrintBulletError {
    fn from(err: TemplateError) -> Self {
        PrintBulletError::TemplateError(err)
    }
}

impl From<ConfigError> for PrintBulletError {
    fn from(err: ConfigError) -> Self {
        PrintBulletError::ConfigError(err)
    }
}
