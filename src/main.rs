use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};
use std::{sync::Arc, thread, time::Duration};

use print_bullet::{
    Config, JobTracker, MoonrakerHost, NotificationService, PrintBulletError, PrintHost,
    PushbulletConnector, Settings, SettingsFile, SystemClock, WebcamSnapshot, composer,
    config::constants, error::ConfigError,
};

mod cli;

use cli::{Cli, Command};

/// Print Bullet - Pushbullet notifications for 3D print jobs.
///
/// Polls a Moonraker instance for the state of the current print and pushes
/// a message (with a webcam snapshot when available) when the job finishes,
/// plus optional periodic progress updates while it runs.
///
/// # Environment Variables
///
/// Required to watch the printer:
/// * `MOONRAKER_API_URL` - Moonraker API endpoint
///
/// Optional (with defaults):
/// * `SETTINGS_FILE` - Notification settings (default: "./settings.json")
/// * `PUSHBULLET_API_URL` - Pushbullet API base (default: "https://api.pushbullet.com/v2")
/// * `POLL_INTERVAL_SECONDS` - Printer poll interval (default: "5")
/// * `REQUEST_TIMEOUT_SECONDS` - HTTP timeout (default: "10")
///
/// # Usage
///
/// ```bash
/// export MOONRAKER_API_URL="http://printer.local:7125"
/// ./print-bullet settings --init
/// ./print-bullet test --token o.XXXXXXXX
/// ./print-bullet
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(PrintBulletError::from)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config),
        Command::Test {
            token,
            channel,
            message,
        } => send_test(&config, token, channel, message),
        Command::Settings { init } => show_settings(&config, init),
    }
}

fn build_service(
    config: &Config,
    moonraker_api_url: &str,
    settings: Settings,
) -> (NotificationService, Arc<MoonrakerHost>) {
    let timeout = Duration::from_secs(config.request_timeout_seconds);
    let host = Arc::new(MoonrakerHost::new(moonraker_api_url.to_string(), timeout));
    let service = NotificationService::new(
        settings,
        Arc::new(PushbulletConnector::new(
            config.pushbullet_api_url.clone(),
            timeout,
        )),
        Arc::new(WebcamSnapshot::new(timeout)),
        host.clone(),
        Arc::new(SystemClock),
    );
    (service, host)
}

fn run(config: &Config) -> Result<()> {
    let moonraker_api_url = config
        .require_moonraker_api_url()
        .map_err(PrintBulletError::from)?;
    let settings = Settings::load(&config.settings_file).map_err(PrintBulletError::from)?;
    let mut settings_file = SettingsFile::new(config.settings_file.clone());

    info!("Print Bullet starting...");
    info!("Using Moonraker API URL: {}", moonraker_api_url);
    info!("Watching settings file {}", settings_file.path().display());
    info!(
        "Periodic updates {} (every {} min)",
        if settings.periodic_updates { "on" } else { "off" },
        settings.periodic_updates_interval
    );

    let (service, host) = build_service(config, moonraker_api_url, settings);
    service.startup();

    let mut tracker = JobTracker::new();
    let poll_interval = Duration::from_secs(config.poll_interval_seconds);

    info!("Print Bullet initialized successfully. Starting monitoring loop...");

    loop {
        if let Some(data) = settings_file.poll_changes() {
            service.save_settings(&data);
        }

        match host.current_job() {
            Ok(status) => {
                debug!(
                    "Printer {:?}, {}% of {:?}",
                    status.state,
                    status.percent(),
                    status.file_path
                );
                for event in tracker.observe(&status) {
                    service.handle_event(event);
                }
            }
            Err(e) => warn!("Failed to get printer status: {}", e),
        }

        thread::sleep(poll_interval);
    }
}

fn send_test(
    config: &Config,
    token: Option<String>,
    channel: Option<String>,
    message: Option<String>,
) -> Result<()> {
    let settings = Settings::load(&config.settings_file).map_err(PrintBulletError::from)?;
    let token = token
        .or_else(|| settings.access_token.clone())
        .ok_or_else(|| {
            PrintBulletError::from(ConfigError::InvalidValue {
                field: "access_token".to_string(),
                value: String::new(),
                reason: "pass --token or set it in the settings file".to_string(),
            })
        })?;
    let channel = channel.or_else(|| settings.push_channel.clone());

    // the test never talks to the printer
    let moonraker_api_url = config
        .moonraker_api_url
        .as_deref()
        .unwrap_or(constants::DEFAULT_MOONRAKER_API_URL);
    let (service, _) = build_service(config, moonraker_api_url, settings);
    let outcome = service.send_test_message(&token, channel.as_deref(), message.as_deref());

    println!("{}", serde_json::to_string(&outcome)?);
    if outcome.result {
        info!("A test message was sent to Pushbullet");
    } else {
        error!("Test message could not be sent to Pushbullet, check settings");
    }
    Ok(())
}

fn show_settings(config: &Config, init: bool) -> Result<()> {
    if init && !config.settings_file.exists() {
        Settings::default()
            .save(&config.settings_file)
            .map_err(PrintBulletError::from)?;
        info!("Wrote default settings to {}", config.settings_file.display());
    }

    let settings = Settings::load(&config.settings_file).map_err(PrintBulletError::from)?;
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);

    // a broken template makes the command fail so scripts notice
    match composer::validate(&settings).into_iter().next() {
        Some(e) => Err(PrintBulletError::from(e).into()),
        None => Ok(()),
    }
}
