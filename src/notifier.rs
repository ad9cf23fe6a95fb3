use std::sync::Arc;

use crate::error::NotifierError;

/// A file stored by the push service, ready to be referenced by a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub file_type: String,
    pub file_url: String,
}

/// Delivers messages to one recipient: the account itself or a channel.
pub trait Notifier: Send + Sync {
    /// Push a plain text note.
    fn push_note(&self, title: &str, body: &str) -> Result<(), NotifierError>;

    /// Upload an image so it can be attached to a push.
    fn upload_file(&self, data: &[u8], filename: &str) -> Result<UploadedFile, NotifierError>;

    /// Push a previously uploaded file with a title and body.
    fn push_file(&self, file: &UploadedFile, title: &str, body: &str)
    -> Result<(), NotifierError>;

    /// Human readable description of the recipient, for logs.
    fn target(&self) -> String;
}

/// Creates [`Notifier`] handles from credentials.
pub trait Connector: Send + Sync {
    /// Validate `token` and resolve `channel`.
    ///
    /// # Errors
    ///
    /// * [`NotifierError::InvalidKey`] if the token is rejected
    /// * [`NotifierError::NoSuchChannel`] if the channel tag is unknown
    /// * any other variant for transient failures
    fn connect(
        &self,
        token: &str,
        channel: Option<&str>,
    ) -> Result<Arc<dyn Notifier>, NotifierError>;
}
