//! Periodic progress update throttle.
//!
//! The printer host reports progress far more often than anybody wants to be
//! notified. [`ProgressThrottle`] decides, tick by tick, whether enough wall
//! clock time has passed since the last opportunity to send an update, and
//! whether an update is still worth sending this close to the end of the job.
//!
//! The timer is re-armed as soon as it expires, before deciding whether to
//! actually send, so at most one update goes out per interval.

use chrono::{DateTime, Local};
use log::debug;

use crate::clock::add_seconds;

/// Where the throttle is in the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No job in flight.
    Idle,
    /// Job in flight, periodic updates enabled; nothing fires before `next_due`.
    Armed { next_due: DateTime<Local> },
    /// Job in flight, periodic updates disabled.
    Disabled,
}

/// Progress and timing of the running job at the moment of a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgressSample {
    /// Completion, 0 to 100.
    pub percent: u8,
    pub elapsed_seconds: Option<i64>,
    pub remaining_seconds: Option<i64>,
    pub file_path: String,
}

/// A periodic update that should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub file_path: String,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    /// Estimated completion time.
    pub eta: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    enabled: bool,
    interval_seconds: i64,
    state: ThrottleState,
}

impl ProgressThrottle {
    /// Create an idle throttle. Negative intervals are treated as zero.
    pub fn new(enabled: bool, interval_seconds: i64) -> Self {
        Self {
            enabled,
            interval_seconds: interval_seconds.max(0),
            state: ThrottleState::Idle,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval_seconds(&self) -> i64 {
        self.interval_seconds
    }

    /// When the next update may fire, `None` when idle or disabled.
    pub fn next_due(&self) -> Option<DateTime<Local>> {
        match self.state {
            ThrottleState::Armed { next_due } => Some(next_due),
            ThrottleState::Idle | ThrottleState::Disabled => None,
        }
    }

    // A zero interval would fire on every tick, so it counts as disabled.
    fn updates_active(&self) -> bool {
        self.enabled && self.interval_seconds > 0
    }

    pub fn job_started(&mut self, now: DateTime<Local>) {
        self.state = if self.updates_active() {
            ThrottleState::Armed {
                next_due: add_seconds(now, self.interval_seconds),
            }
        } else {
            ThrottleState::Disabled
        };
        debug!("Print started, periodic update throttle is {:?}", self.state);
    }

    pub fn job_done(&mut self) {
        self.state = ThrottleState::Idle;
    }

    /// Apply new settings.
    ///
    /// A running timer restarts from `now` with the new interval; nothing is
    /// sent immediately. Switching updates on or off while a job is running
    /// takes effect on the next tick.
    pub fn settings_changed(&mut self, enabled: bool, interval_seconds: i64, now: DateTime<Local>) {
        self.enabled = enabled;
        self.interval_seconds = interval_seconds.max(0);

        if let ThrottleState::Armed { .. } = self.state {
            self.state = if self.interval_seconds > 0 {
                ThrottleState::Armed {
                    next_due: add_seconds(now, self.interval_seconds),
                }
            } else {
                ThrottleState::Disabled
            };
        }
    }

    /// Evaluate a progress tick and return the update to send, if any.
    pub fn on_tick(
        &mut self,
        sample: &JobProgressSample,
        now: DateTime<Local>,
    ) -> Option<ProgressUpdate> {
        let next_due = match self.state {
            ThrottleState::Idle => return None,
            ThrottleState::Disabled => {
                if self.updates_active() {
                    self.state = ThrottleState::Armed {
                        next_due: add_seconds(now, self.interval_seconds),
                    };
                }
                return None;
            }
            ThrottleState::Armed { next_due } => next_due,
        };

        if !self.updates_active() {
            self.state = ThrottleState::Disabled;
            return None;
        }

        if now < next_due {
            return None;
        }

        self.state = ThrottleState::Armed {
            next_due: add_seconds(now, self.interval_seconds),
        };

        // no point in reporting before the host knows how far along we are
        let (Some(elapsed_seconds), Some(remaining_seconds)) =
            (sample.elapsed_seconds, sample.remaining_seconds)
        else {
            debug!(
                "Skip periodic update, timing not known yet (elapsed {:?}, remaining {:?})",
                sample.elapsed_seconds, sample.remaining_seconds
            );
            return None;
        };

        if remaining_seconds < self.interval_seconds {
            debug!(
                "Skip trailing message since print is nearly done: {} of {}",
                remaining_seconds, self.interval_seconds
            );
            return None;
        }

        Some(ProgressUpdate {
            percent: sample.percent,
            file_path: sample.file_path.clone(),
            elapsed_seconds,
            remaining_seconds,
            eta: add_seconds(now, remaining_seconds),
        })
    }
}
