//! Print Bullet - Pushbullet notifications for 3D print jobs.
//!
//! This library follows a print job on a Moonraker host and forwards
//! human-readable messages, optionally with a webcam snapshot, to Pushbullet:
//! one when the job finishes and, if enabled, periodic progress updates
//! spaced at least a configured interval apart.
//!
//! # Core Components
//!
//! * [`throttle`] - Decides when a periodic progress update is due
//! * [`composer`] - Renders message templates and their placeholders
//! * [`service`] - Event handling, settings changes and the background worker
//! * [`delivery`] - Image push with fallback to a text note
//! * [`pushbullet`] - Pushbullet REST client behind the [`notifier`] traits
//! * [`snapshot`] - Webcam snapshot download, flips and rotation
//! * [`printer`] / [`tracker`] - Moonraker status polling and lifecycle events
//! * [`settings`] / [`config`] - Notification settings and process configuration
//! * [`error`] - Error types
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use print_bullet::*;
//! use std::{sync::Arc, time::Duration};
//!
//! let config = Config::load()?;
//! let settings = Settings::load(&config.settings_file)?;
//! let timeout = Duration::from_secs(config.request_timeout_seconds);
//!
//! let service = NotificationService::new(
//!     settings,
//!     Arc::new(PushbulletConnector::new(config.pushbullet_api_url.clone(), timeout)),
//!     Arc::new(WebcamSnapshot::new(timeout)),
//!     Arc::new(MoonrakerHost::new(
//!         config.require_moonraker_api_url()?.to_string(),
//!         timeout,
//!     )),
//!     Arc::new(SystemClock),
//! );
//! service.startup();
//! # Ok::<(), PrintBulletError>(())
//! ```

pub mod clock;
pub mod composer;
pub mod config;
pub mod delivery;
pub mod error;
pub mod notifier;
pub mod printer;
pub mod pushbullet;
pub mod service;
pub mod settings;
pub mod snapshot;
pub mod throttle;
pub mod timefmt;
pub mod tracker;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use composer::Message;
pub use config::Config;
pub use error::PrintBulletError;
pub use notifier::{Connector, Notifier, UploadedFile};
pub use printer::{JobStatus, MoonrakerHost, PrintHost, PrinterState};
pub use pushbullet::PushbulletConnector;
pub use service::{NotificationService, TestFailure, TestOutcome};
pub use settings::{MessageTemplate, Settings, SettingsFile, WebcamSettings};
pub use snapshot::{ImageTransform, SnapshotProvider, WebcamSnapshot};
pub use throttle::{JobProgressSample, ProgressThrottle, ProgressUpdate, ThrottleState};
pub use tracker::{JobTracker, PrintEvent};
