use log::{debug, info};

use crate::printer::{JobStatus, PrinterState};

/// Lifecycle events derived from successive printer polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintEvent {
    JobStarted { file: String },
    ProgressTick { percent: u8 },
    JobDone {
        file: String,
        elapsed_seconds: Option<i64>,
    },
    /// The job stopped without completing (cancelled, error, reset).
    JobEnded { file: String, state: PrinterState },
}

/// Turns printer status polls into [`PrintEvent`]s.
///
/// A job that is already running when the first poll comes in counts as
/// started. Progress ticks fire each time the whole percentage advances.
#[derive(Debug, Default)]
pub struct JobTracker {
    last_state: Option<PrinterState>,
    last_percent: Option<u8>,
    current_file: String,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, status: &JobStatus) -> Vec<PrintEvent> {
        let mut events = Vec::new();
        let was_active = self
            .last_state
            .as_ref()
            .map(PrinterState::is_active)
            .unwrap_or(false);

        if self.last_state.as_ref() != Some(&status.state) {
            info!("Printer state changed to {:?}", status.state);
        }

        if let Some(file) = &status.file_path {
            self.current_file = file.clone();
        }

        match &status.state {
            PrinterState::Printing | PrinterState::Paused if !was_active => {
                self.last_percent = None;
                events.push(PrintEvent::JobStarted {
                    file: self.current_file.clone(),
                });
            }
            PrinterState::Complete if was_active => {
                events.push(PrintEvent::JobDone {
                    file: self.current_file.clone(),
                    elapsed_seconds: status.elapsed_seconds,
                });
            }
            state if was_active && !state.is_active() => {
                events.push(PrintEvent::JobEnded {
                    file: self.current_file.clone(),
                    state: state.clone(),
                });
            }
            _ => {}
        }

        if status.state == PrinterState::Printing {
            let percent = status.percent();
            if self.last_percent.is_none_or(|last| percent > last) {
                debug!("Print progress {}%", percent);
                self.last_percent = Some(percent);
                events.push(PrintEvent::ProgressTick { percent });
            }
        }

        self.last_state = Some(status.state.clone());
        events
    }
}
