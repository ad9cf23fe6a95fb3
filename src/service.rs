//! Wires the throttle, composer and delivery together.
//!
//! [`NotificationService`] is driven synchronously by the printer event loop.
//! Anything slow (connecting to Pushbullet, fetching a snapshot, uploading)
//! runs on a background worker so the event loop never waits on the network.
//!
//! All mutable state lives behind a single mutex: the current settings, the
//! throttle and the cached notifier handle. The lock is never held across a
//! network call; the worker only takes it to read the handle or swap it.

use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::{Arc, Mutex, MutexGuard, mpsc},
    thread::{self, JoinHandle},
};

use crate::clock::Clock;
use crate::composer::{self, Message};
use crate::config::constants::{TEST_MESSAGE_BODY, TEST_MESSAGE_TITLE};
use crate::delivery::deliver;
use crate::error::{NotifierError, TemplateError};
use crate::notifier::{Connector, Notifier};
use crate::printer::PrintHost;
use crate::settings::Settings;
use crate::snapshot::SnapshotProvider;
use crate::throttle::{JobProgressSample, ProgressThrottle, ThrottleState};
use crate::tracker::PrintEvent;

struct Shared {
    settings: Settings,
    throttle: ProgressThrottle,
    notifier: Option<Arc<dyn Notifier>>,
}

/// Why a test message could not be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFailure {
    /// The access token was rejected.
    ApiKey,
    /// The channel does not exist.
    Channel,
}

/// Result of [`NotificationService::send_test_message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TestFailure>,
}

enum Job {
    Reconnect {
        token: Option<String>,
        channel: Option<String>,
    },
    Deliver(Message),
    Flush(mpsc::Sender<()>),
}

pub struct NotificationService {
    shared: Arc<Mutex<Shared>>,
    connector: Arc<dyn Connector>,
    snapshots: Arc<dyn SnapshotProvider>,
    host: Arc<dyn PrintHost>,
    clock: Arc<dyn Clock>,
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationService {
    /// Create the service and start its background worker.
    ///
    /// No connection is made yet, see [`Self::startup`].
    pub fn new(
        settings: Settings,
        connector: Arc<dyn Connector>,
        snapshots: Arc<dyn SnapshotProvider>,
        host: Arc<dyn PrintHost>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let throttle = ProgressThrottle::new(settings.periodic_updates, settings.interval_seconds());
        let shared = Arc::new(Mutex::new(Shared {
            settings,
            throttle,
            notifier: None,
        }));

        let (jobs, queue) = mpsc::channel();
        let worker = {
            let shared = Arc::clone(&shared);
            let connector = Arc::clone(&connector);
            let snapshots = Arc::clone(&snapshots);
            thread::Builder::new()
                .name("print-bullet-worker".to_string())
                .spawn(move || run_worker(queue, shared, connector, snapshots))
        };
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start background worker: {}", e);
                None
            }
        };

        Self {
            shared,
            connector,
            snapshots,
            host,
            clock,
            jobs: worker.as_ref().map(|_| jobs),
            worker,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    fn submit(&self, job: Job) {
        let sent = self
            .jobs
            .as_ref()
            .map(|jobs| jobs.send(job).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!("Background worker is not running, dropping job");
        }
    }

    /// Connect to Pushbullet with the configured credentials.
    ///
    /// Runs on the calling thread; configuration problems are logged and
    /// leave the service without a notifier.
    pub fn startup(&self) {
        let (token, channel, template_errors) = {
            let shared = self.lock();
            (
                shared.settings.access_token.clone(),
                shared.settings.push_channel.clone(),
                composer::validate(&shared.settings),
            )
        };
        report_template_errors(&template_errors);

        let notifier = connect_notifier(self.connector.as_ref(), token.as_deref(), channel.as_deref());
        self.lock().notifier = notifier;
    }

    /// React to a printer lifecycle event.
    pub fn handle_event(&self, event: PrintEvent) {
        match event {
            PrintEvent::JobStarted { file } => {
                info!("Print job started: {}", file);
                self.lock().throttle.job_started(self.clock.now());
            }
            PrintEvent::ProgressTick { percent } => self.on_progress(percent),
            PrintEvent::JobDone {
                file,
                elapsed_seconds,
            } => {
                let message = {
                    let mut shared = self.lock();
                    shared.throttle.job_done();
                    composer::done_message(&shared.settings.print_done, &file, elapsed_seconds)
                };
                self.submit(Job::Deliver(message));
            }
            PrintEvent::JobEnded { file, state } => {
                info!("Print job {} ended without finishing ({:?})", file, state);
                self.lock().throttle.job_done();
            }
        }
    }

    fn on_progress(&self, percent: u8) {
        {
            // most ticks land in a quiet period, skip the status query for those
            let mut shared = self.lock();
            let now = self.clock.now();
            match shared.throttle.state() {
                ThrottleState::Idle => return,
                ThrottleState::Armed { next_due } if now < next_due => return,
                ThrottleState::Disabled => {
                    // arming never needs job timing, and a disabled throttle never sends
                    let sample = JobProgressSample {
                        percent,
                        elapsed_seconds: None,
                        remaining_seconds: None,
                        file_path: String::new(),
                    };
                    let _ = shared.throttle.on_tick(&sample, now);
                    return;
                }
                ThrottleState::Armed { .. } => {}
            }
        }

        let status = match self.host.current_job() {
            Ok(status) => status,
            Err(e) => {
                warn!("Could not read job timing for progress update: {}", e);
                return;
            }
        };
        let sample = JobProgressSample {
            percent,
            elapsed_seconds: status.elapsed_seconds,
            remaining_seconds: status.remaining_seconds,
            file_path: status.file_path.unwrap_or_default(),
        };

        let message = {
            let mut shared = self.lock();
            let update = shared.throttle.on_tick(&sample, self.clock.now());
            update.map(|update| composer::progress_message(&shared.settings.print_progress, &update))
        };

        if let Some(message) = message {
            self.submit(Job::Deliver(message));
        }
    }

    /// Apply a (partial) settings document, as saved by the operator.
    ///
    /// A running periodic timer restarts with the new interval and the
    /// Pushbullet connection is re-established in the background.
    pub fn save_settings(&self, data: &Value) {
        let (token, channel, template_errors) = {
            let mut shared = self.lock();
            shared.settings.apply_update(data);
            let (enabled, interval) = (
                shared.settings.periodic_updates,
                shared.settings.interval_seconds(),
            );
            shared
                .throttle
                .settings_changed(enabled, interval, self.clock.now());
            (
                shared.settings.access_token.clone(),
                shared.settings.push_channel.clone(),
                composer::validate(&shared.settings),
            )
        };
        report_template_errors(&template_errors);

        self.submit(Job::Reconnect { token, channel });
    }

    /// Send a message right away with the given credentials, bypassing the
    /// throttle and the cached connection.
    pub fn send_test_message(
        &self,
        token: &str,
        channel: Option<&str>,
        message: Option<&str>,
    ) -> TestOutcome {
        let channel = channel.filter(|c| !c.trim().is_empty());
        let notifier = match self.connector.connect(token, channel) {
            Ok(notifier) => notifier,
            Err(NotifierError::NoSuchChannel { channel }) => {
                warn!("Test message: could not find channel {}", channel);
                return TestOutcome {
                    result: false,
                    error: Some(TestFailure::Channel),
                };
            }
            Err(NotifierError::InvalidKey) => {
                warn!("Test message: invalid Pushbullet access token");
                return TestOutcome {
                    result: false,
                    error: Some(TestFailure::ApiKey),
                };
            }
            Err(e) => {
                error!("Test message: error while connecting to Pushbullet: {}", e);
                return TestOutcome {
                    result: false,
                    error: None,
                };
            }
        };

        let message = composer::test_message(
            TEST_MESSAGE_TITLE,
            message.unwrap_or(TEST_MESSAGE_BODY),
            self.clock.now(),
        );
        let webcam = self.lock().settings.webcam.clone();
        let result = deliver(
            Some(notifier.as_ref()),
            &message,
            Some((self.snapshots.as_ref(), &webcam)),
        );

        TestOutcome {
            result,
            error: None,
        }
    }

    /// Block until every job queued so far has been processed.
    pub fn flush(&self) {
        let (done, wait) = mpsc::channel();
        self.submit(Job::Flush(done));
        let _ = wait.recv();
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn throttle_state(&self) -> ThrottleState {
        self.lock().throttle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().notifier.is_some()
    }
}

impl Drop for NotificationService {
    fn drop(&mut self) {
        // closing the queue ends the worker loop
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Background worker panicked");
            }
        }
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker(
    queue: mpsc::Receiver<Job>,
    shared: Arc<Mutex<Shared>>,
    connector: Arc<dyn Connector>,
    snapshots: Arc<dyn SnapshotProvider>,
) {
    for job in queue {
        match job {
            Job::Reconnect { token, channel } => {
                let notifier =
                    connect_notifier(connector.as_ref(), token.as_deref(), channel.as_deref());
                lock_shared(&shared).notifier = notifier;
            }
            Job::Deliver(message) => {
                let (notifier, webcam) = {
                    let shared = lock_shared(&shared);
                    (shared.notifier.clone(), shared.settings.webcam.clone())
                };
                if !deliver(
                    notifier.as_deref(),
                    &message,
                    Some((snapshots.as_ref(), &webcam)),
                ) {
                    warn!("Notification '{}' was not delivered", message.title);
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn connect_notifier(
    connector: &dyn Connector,
    token: Option<&str>,
    channel: Option<&str>,
) -> Option<Arc<dyn Notifier>> {
    let Some(token) = token else {
        info!("No Pushbullet access token configured, notifications are off");
        return None;
    };

    match connector.connect(token, channel) {
        Ok(notifier) => Some(notifier),
        Err(NotifierError::NoSuchChannel { channel }) => {
            warn!(
                "Could not find channel {}, please check your configuration!",
                channel
            );
            None
        }
        Err(NotifierError::InvalidKey) => {
            error!("Invalid Pushbullet API key, please check your configuration!");
            None
        }
        Err(e) => {
            error!("Error while connecting to Pushbullet: {}", e);
            None
        }
    }
}

fn report_template_errors(errors: &[TemplateError]) {
    for e in errors {
        error!("{}", e);
    }
}
