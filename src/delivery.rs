use log::{debug, error, info, warn};

use crate::composer::Message;
use crate::notifier::Notifier;
use crate::settings::WebcamSettings;
use crate::snapshot::SnapshotProvider;

/// Deliver `message`, attaching a webcam snapshot when one can be taken.
///
/// Never fails outwardly: every lower-level error is logged and folded into
/// the returned flag. If the image push cannot be completed a text-only note
/// is sent instead, and the note's outcome is what gets reported.
///
/// Returns `false` without doing anything when there is no notifier.
pub fn deliver(
    notifier: Option<&dyn Notifier>,
    message: &Message,
    snapshots: Option<(&dyn SnapshotProvider, &WebcamSettings)>,
) -> bool {
    let Some(notifier) = notifier else {
        debug!("No Pushbullet connection, dropping message '{}'", message.title);
        return false;
    };

    if let Some((provider, webcam)) = snapshots.filter(|(_, webcam)| webcam.snapshot.is_some()) {
        match provider.capture(webcam) {
            Ok(image_data) => {
                if send_with_image(notifier, message, &image_data) {
                    return true;
                }
                warn!("Could not send a file message with the webcam image, sending only a note");
            }
            Err(e) => warn!(
                "Exception while fetching snapshot from webcam, sending only a note: {}",
                e
            ),
        }
    }

    send_note(notifier, message)
}

fn send_with_image(notifier: &dyn Notifier, message: &Message, image_data: &[u8]) -> bool {
    let file = match notifier.upload_file(image_data, &message.attachment_name) {
        Ok(file) => file,
        Err(e) => {
            error!("Error while uploading snapshot: {}", e);
            return false;
        }
    };

    match notifier.push_file(&file, &message.title, &message.body) {
        Ok(()) => {
            info!(
                "Pushed '{}' with snapshot to {}",
                message.title,
                notifier.target()
            );
            true
        }
        Err(e) => {
            error!("Error while pushing snapshot: {}", e);
            false
        }
    }
}

fn send_note(notifier: &dyn Notifier, message: &Message) -> bool {
    match notifier.push_note(&message.title, &message.body) {
        Ok(()) => {
            info!("Pushed note '{}' to {}", message.title, notifier.target());
            true
        }
        Err(e) => {
            error!("Error while pushing a note: {}", e);
            false
        }
    }
}
