use chrono::{DateTime, Local};
use log::error;
use serde::Serialize;
use std::path::Path;
use tinytemplate::{TinyTemplate, format_unescaped};

use crate::error::TemplateError;
use crate::settings::{MessageTemplate, Settings};
use crate::throttle::ProgressUpdate;
use crate::timefmt::{format_duration, format_eta, format_optional_duration};

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
    /// File name used if a snapshot gets attached.
    pub attachment_name: String,
}

/// Placeholders available to the `printDone` template.
#[derive(Debug, Clone, Serialize)]
pub struct DonePlaceholders {
    /// Base name without its extension.
    pub file: String,
    pub elapsed_time: String,
}

/// Placeholders available to the `printProgress` template.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressPlaceholders {
    pub progress: u8,
    /// Base name including its extension.
    pub file: String,
    pub elapsed_time: String,
    pub remaining_time: String,
    pub eta: String,
}

impl ProgressPlaceholders {
    pub fn from_update(update: &ProgressUpdate) -> Self {
        Self {
            progress: update.percent,
            file: file_name(&update.file_path),
            elapsed_time: format_duration(update.elapsed_seconds),
            remaining_time: format_duration(update.remaining_seconds),
            eta: format_eta(update.eta, update.remaining_seconds),
        }
    }
}

/// Render the title and body of `template` against `context`.
///
/// # Errors
///
/// Returns [`TemplateError::Invalid`] for malformed templates and
/// [`TemplateError::Render`] when a placeholder is not part of `context`.
pub fn render<C: Serialize>(
    template: &MessageTemplate,
    context: &C,
) -> Result<(String, String), TemplateError> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);

    for (name, text) in [("title", &template.title), ("body", &template.body)] {
        tt.add_template(name, text)
            .map_err(|e| TemplateError::Invalid {
                template: text.clone(),
                reason: e.to_string(),
            })?;
    }

    let render_one = |name: &str, text: &str| {
        tt.render(name, context).map_err(|e| TemplateError::Render {
            template: text.to_string(),
            reason: e.to_string(),
        })
    };

    Ok((
        render_one("title", &template.title)?,
        render_one("body", &template.body)?,
    ))
}

// Broken templates fall back to the built-in one.
fn render_or_default<C: Serialize>(
    template: &MessageTemplate,
    fallback: MessageTemplate,
    context: &C,
) -> (String, String) {
    match render(template, context) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("{}; sending the default message instead", e);
            render(&fallback, context).unwrap_or((fallback.title, fallback.body))
        }
    }
}

/// Compose the "job done" notification.
pub fn done_message(
    template: &MessageTemplate,
    file_path: &str,
    elapsed_seconds: Option<i64>,
) -> Message {
    let context = DonePlaceholders {
        file: file_stem(file_path),
        elapsed_time: format_optional_duration(elapsed_seconds),
    };
    let (title, body) =
        render_or_default(template, MessageTemplate::default_print_done(), &context);

    Message {
        title,
        body,
        attachment_name: format!("{}-done.jpg", file_stem(file_path)),
    }
}

/// Compose a periodic progress notification.
pub fn progress_message(template: &MessageTemplate, update: &ProgressUpdate) -> Message {
    let context = ProgressPlaceholders::from_update(update);
    let (title, body) =
        render_or_default(template, MessageTemplate::default_print_progress(), &context);

    Message {
        title,
        body,
        attachment_name: format!("{}-{}.jpg", file_stem(&update.file_path), update.percent),
    }
}

/// Compose an operator triggered test notification.
pub fn test_message(title: &str, body: &str, now: DateTime<Local>) -> Message {
    Message {
        title: title.to_string(),
        body: body.to_string(),
        attachment_name: format!("test-{}.jpg", now.timestamp()),
    }
}

/// Check both templates of `settings` against sample placeholders.
///
/// Returns every problem found, empty when both templates render.
pub fn validate(settings: &Settings) -> Vec<TemplateError> {
    let done = DonePlaceholders {
        file: "test".to_string(),
        elapsed_time: format_duration(0),
    };
    let progress = ProgressPlaceholders {
        progress: 0,
        file: "test.gcode".to_string(),
        elapsed_time: format_duration(0),
        remaining_time: format_duration(0),
        eta: "00:00".to_string(),
    };

    [
        render(&settings.print_done, &done).err(),
        render(&settings.print_progress, &progress).err(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Base name of a path, including its extension.
pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "print".to_string())
}
