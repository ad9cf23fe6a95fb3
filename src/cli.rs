use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "print-bullet",
    version,
    about = "Pushbullet notifications for Moonraker print jobs",
    long_about = None,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the notifier.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the printer and send notifications
    Run,
    /// Send a test message right away, with a webcam snapshot if configured
    Test {
        /// Access token to test. Falls back to the settings file.
        #[arg(long)]
        token: Option<String>,
        /// Channel tag to push to instead of the account
        #[arg(long)]
        channel: Option<String>,
        /// Message body
        #[arg(long)]
        message: Option<String>,
    },
    /// Print the effective settings with credentials hidden
    Settings {
        /// Write the default settings file if none exists yet
        #[arg(long)]
        init: bool,
    },
}
