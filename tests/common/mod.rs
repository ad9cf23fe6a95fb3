#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use print_bullet::error::{NotifierError, PrinterError, SnapshotError};
use print_bullet::{
    Connector, JobStatus, Notifier, PrintHost, PrinterState, SnapshotProvider, UploadedFile,
    WebcamSettings,
};
use std::sync::{Arc, Mutex};

pub fn start_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Note { title: String, body: String },
    Upload { filename: String, size: usize },
    File { file_name: String, title: String, body: String },
}

/// Records every call; individual steps can be told to fail.
#[derive(Default)]
pub struct MockNotifier {
    pub calls: Mutex<Vec<Call>>,
    pub fail_upload: bool,
    pub fail_push_file: bool,
    pub fail_note: bool,
}

impl MockNotifier {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Note { title, body } => Some((title, body)),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<(String, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::File {
                    file_name,
                    title,
                    body,
                } => Some((file_name, title, body)),
                _ => None,
            })
            .collect()
    }
}

fn failure() -> NotifierError {
    NotifierError::ApiError {
        endpoint: "mock".to_string(),
        status: 500,
        message: "boom".to_string(),
    }
}

impl Notifier for MockNotifier {
    fn push_note(&self, title: &str, body: &str) -> Result<(), NotifierError> {
        self.calls.lock().unwrap().push(Call::Note {
            title: title.to_string(),
            body: body.to_string(),
        });
        if self.fail_note { Err(failure()) } else { Ok(()) }
    }

    fn upload_file(&self, data: &[u8], filename: &str) -> Result<UploadedFile, NotifierError> {
        self.calls.lock().unwrap().push(Call::Upload {
            filename: filename.to_string(),
            size: data.len(),
        });
        if self.fail_upload {
            return Err(failure());
        }
        Ok(UploadedFile {
            file_name: filename.to_string(),
            file_type: "image/jpeg".to_string(),
            file_url: format!("https://files.example/{}", filename),
        })
    }

    fn push_file(&self, file: &UploadedFile, title: &str, body: &str) -> Result<(), NotifierError> {
        self.calls.lock().unwrap().push(Call::File {
            file_name: file.file_name.clone(),
            title: title.to_string(),
            body: body.to_string(),
        });
        if self.fail_push_file { Err(failure()) } else { Ok(()) }
    }

    fn target(&self) -> String {
        "mock".to_string()
    }
}

/// Accepts the token "good"; "bad" is an invalid key, "down" a transient
/// failure. Only the channel "printers" exists.
pub struct MockConnector {
    pub notifier: Arc<MockNotifier>,
    pub connects: Mutex<Vec<(String, Option<String>)>>,
}

impl MockConnector {
    pub fn new(notifier: Arc<MockNotifier>) -> Self {
        Self {
            notifier,
            connects: Mutex::new(Vec::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        token: &str,
        channel: Option<&str>,
    ) -> Result<Arc<dyn Notifier>, NotifierError> {
        self.connects
            .lock()
            .unwrap()
            .push((token.to_string(), channel.map(ToOwned::to_owned)));
        match token {
            "bad" => return Err(NotifierError::InvalidKey),
            "down" => {
                return Err(NotifierError::RequestFailed {
                    endpoint: "mock".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            _ => {}
        }
        if let Some(channel) = channel {
            if channel != "printers" {
                return Err(NotifierError::NoSuchChannel {
                    channel: channel.to_string(),
                });
            }
        }
        Ok(self.notifier.clone())
    }
}

/// Returns fixed bytes, or fails when `image` is `None`.
pub struct MockSnapshot {
    pub image: Option<Vec<u8>>,
    pub captures: Mutex<usize>,
}

impl MockSnapshot {
    pub fn ok() -> Self {
        Self {
            image: Some(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            captures: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            image: None,
            captures: Mutex::new(0),
        }
    }

    pub fn capture_count(&self) -> usize {
        *self.captures.lock().unwrap()
    }
}

impl SnapshotProvider for MockSnapshot {
    fn capture(&self, webcam: &WebcamSettings) -> Result<Vec<u8>, SnapshotError> {
        *self.captures.lock().unwrap() += 1;
        self.image.clone().ok_or_else(|| SnapshotError::DownloadFailed {
            url: webcam.snapshot.clone().unwrap_or_default(),
            reason: "camera offline".to_string(),
        })
    }
}

/// A printer whose job timing is set by the test.
pub struct MockHost {
    pub status: Mutex<JobStatus>,
    pub queries: Mutex<usize>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(JobStatus {
                state: PrinterState::Printing,
                file_path: Some("benchy.gcode".to_string()),
                progress: 0.0,
                elapsed_seconds: None,
                remaining_seconds: None,
            }),
            queries: Mutex::new(0),
        }
    }

    pub fn set_timing(&self, elapsed: Option<i64>, remaining: Option<i64>) {
        let mut status = self.status.lock().unwrap();
        status.elapsed_seconds = elapsed;
        status.remaining_seconds = remaining;
    }

    pub fn query_count(&self) -> usize {
        *self.queries.lock().unwrap()
    }
}

impl PrintHost for MockHost {
    fn current_job(&self) -> Result<JobStatus, PrinterError> {
        *self.queries.lock().unwrap() += 1;
        Ok(self.status.lock().unwrap().clone())
    }
}
