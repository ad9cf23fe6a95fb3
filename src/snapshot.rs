use log::{info, warn};
use reqwest::blocking::Client;
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::error::SnapshotError;
use crate::settings::WebcamSettings;

const FFMPEG_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captures one still image from the printer's webcam.
pub trait SnapshotProvider: Send + Sync {
    /// Fetch a snapshot according to `webcam` and apply its flips/rotation.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotConfigured`] when no snapshot URL is set and
    /// [`SnapshotError::DownloadFailed`] when the camera cannot be reached.
    /// Post-processing failures are not errors: the untransformed image is
    /// returned instead.
    fn capture(&self, webcam: &WebcamSettings) -> Result<Vec<u8>, SnapshotError>;
}

/// Flips and rotation to apply to a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTransform {
    pub flip_h: bool,
    pub flip_v: bool,
    /// 90 degrees counter clockwise.
    pub rotate90: bool,
}

impl ImageTransform {
    pub fn from_settings(webcam: &WebcamSettings) -> Self {
        Self {
            flip_h: webcam.flip_h,
            flip_v: webcam.flip_v,
            rotate90: webcam.rotate90,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.flip_h && !self.flip_v && !self.rotate90
    }

    /// The ffmpeg `-vf` filter chain for this transform.
    ///
    /// Forcing `yuv420p` first keeps ffmpeg from choking on some webcam JPEGs.
    pub fn ffmpeg_filter(&self) -> String {
        let mut params = vec!["format=yuv420p"];
        if self.rotate90 {
            params.push("transpose=2");
        }
        if self.flip_h {
            params.push("hflip");
        }
        if self.flip_v {
            params.push("vflip");
        }
        params.join(",")
    }

    /// Apply the transform in-process and re-encode the result as JPEG.
    ///
    /// Rotation happens before flipping, matching [`Self::ffmpeg_filter`].
    pub fn apply(&self, image_data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
        if self.is_identity() {
            return Ok(image_data.to_vec());
        }

        let transform_error = |e: image::ImageError| SnapshotError::TransformFailed {
            reason: e.to_string(),
        };

        let mut image = image::load_from_memory(image_data).map_err(transform_error)?;
        if self.rotate90 {
            image = image.rotate270();
        }
        if self.flip_h {
            image = image.fliph();
        }
        if self.flip_v {
            image = image.flipv();
        }

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image::DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .map_err(transform_error)?;

        Ok(buffer)
    }

    /// Apply the transform by running an external ffmpeg binary.
    ///
    /// ffmpeg is killed if it has not finished within `timeout`.
    pub fn apply_with_ffmpeg(
        &self,
        ffmpeg: &Path,
        image_data: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, SnapshotError> {
        if self.is_identity() {
            return Ok(image_data.to_vec());
        }

        let io_error = |e: std::io::Error| SnapshotError::TransformFailed {
            reason: e.to_string(),
        };

        // ffmpeg can't guess the file type without the extension
        let mut input = tempfile::Builder::new()
            .suffix(".jpg")
            .tempfile()
            .map_err(io_error)?;
        input.write_all(image_data).map_err(io_error)?;
        input.flush().map_err(io_error)?;
        let output = tempfile::Builder::new()
            .suffix(".jpg")
            .tempfile()
            .map_err(io_error)?;

        let filter = self.ffmpeg_filter();
        info!(
            "Running: {} -y -loglevel error -i {} -vf {} {}",
            ffmpeg.display(),
            input.path().display(),
            filter,
            output.path().display()
        );

        let mut child = Command::new(ffmpeg)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input.path())
            .arg("-vf")
            .arg(&filter)
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;

        let status = wait_with_deadline(&mut child, timeout)?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(SnapshotError::TransformFailed {
                reason: format!("ffmpeg exited with {}: {}", status, stderr.trim()),
            });
        }

        info!("Rotated/flipped image with ffmpeg");
        std::fs::read(output.path()).map_err(io_error)
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, SnapshotError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SnapshotError::TransformFailed {
                    reason: format!("ffmpeg did not finish within {:?}", timeout),
                });
            }
            Ok(None) => thread::sleep(FFMPEG_POLL_INTERVAL),
            Err(e) => {
                return Err(SnapshotError::TransformFailed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Downloads snapshots over HTTP and post-processes them.
pub struct WebcamSnapshot {
    client: Client,
    timeout: Duration,
}

impl WebcamSnapshot {
    /// Create a new fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });
        Self { client, timeout }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, SnapshotError> {
        let download_error = |reason: String| SnapshotError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                download_error(format!("timed out after {:?}", self.timeout))
            } else {
                download_error(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(download_error(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        let data = response.bytes().map_err(|e| download_error(e.to_string()))?;
        Ok(data.to_vec())
    }
}

impl SnapshotProvider for WebcamSnapshot {
    fn capture(&self, webcam: &WebcamSettings) -> Result<Vec<u8>, SnapshotError> {
        let url = webcam
            .snapshot
            .as_deref()
            .ok_or(SnapshotError::NotConfigured)?;
        let image_data = self.download(url)?;

        let transform = ImageTransform::from_settings(webcam);
        if transform.is_identity() {
            return Ok(image_data);
        }

        let transformed = match usable_ffmpeg(webcam) {
            Some(ffmpeg) => transform.apply_with_ffmpeg(&ffmpeg, &image_data, self.timeout),
            None => transform.apply(&image_data),
        };

        match transformed {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!("{}, sending the snapshot as is", e);
                Ok(image_data)
            }
        }
    }
}

fn usable_ffmpeg(webcam: &WebcamSettings) -> Option<PathBuf> {
    let path = PathBuf::from(webcam.ffmpeg.as_deref()?);
    is_executable(&path).then_some(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
