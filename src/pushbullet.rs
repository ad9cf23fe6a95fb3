use log::info;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};

use crate::error::NotifierError;
use crate::notifier::{Connector, Notifier, UploadedFile};

const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Connects to Pushbullet over its REST API.
///
/// Every request is bounded by `timeout`.
pub struct PushbulletConnector {
    api_url: String,
    timeout: Duration,
}

impl PushbulletConnector {
    /// Create a new connector.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the API (e.g., "https://api.pushbullet.com/v2")
    /// * `timeout` - Upper bound for each HTTP request
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    file_name: String,
    file_type: String,
    file_url: String,
    upload_url: String,
}

impl Connector for PushbulletConnector {
    fn connect(
        &self,
        token: &str,
        channel: Option<&str>,
    ) -> Result<Arc<dyn Notifier>, NotifierError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NotifierError::RequestFailed {
                endpoint: self.api_url.clone(),
                reason: e.to_string(),
            })?;

        let mut sender = PushbulletSender {
            client,
            api_url: self.api_url.clone(),
            token: token.to_string(),
            channel_tag: None,
        };

        // validates the token
        let _: Value = sender.get_json("users/me")?;

        if let Some(channel) = channel {
            let list: ChannelList = sender.get_json("channels")?;
            if !list.channels.iter().any(|c| c.tag == channel) {
                return Err(NotifierError::NoSuchChannel {
                    channel: channel.to_string(),
                });
            }
            sender.channel_tag = Some(channel.to_string());
            info!("Connected to Pushbullet on channel {}", channel);
        } else {
            info!("Connected to Pushbullet");
        }

        Ok(Arc::new(sender))
    }
}

/// A validated Pushbullet recipient.
pub struct PushbulletSender {
    client: Client,
    api_url: String,
    token: String,
    channel_tag: Option<String>,
}

impl PushbulletSender {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NotifierError> {
        let endpoint = self.endpoint(path);
        let request = self
            .client
            .get(&endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.token);
        parse_json(&endpoint, send(&endpoint, request)?)
    }

    fn post_push(&self, mut push: Value) -> Result<(), NotifierError> {
        if let Some(tag) = &self.channel_tag {
            push["channel_tag"] = json!(tag);
        }
        let endpoint = self.endpoint("pushes");
        let request = self
            .client
            .post(&endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .json(&push);
        send(&endpoint, request)?;
        Ok(())
    }
}

impl Notifier for PushbulletSender {
    fn push_note(&self, title: &str, body: &str) -> Result<(), NotifierError> {
        self.post_push(json!({
            "type": "note",
            "title": title,
            "body": body,
        }))
    }

    /// Upload an image in two steps: ask for an upload slot, then post the
    /// bytes to it as a multipart form.
    fn upload_file(&self, data: &[u8], filename: &str) -> Result<UploadedFile, NotifierError> {
        let endpoint = self.endpoint("upload-request");
        let request = self
            .client
            .post(&endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .json(&json!({
                "file_name": filename,
                "file_type": "image/jpeg",
            }));
        let slot: UploadRequest = parse_json(&endpoint, send(&endpoint, request)?)?;

        let part = multipart::Part::bytes(data.to_vec())
            .file_name(slot.file_name.clone())
            .mime_str(&slot.file_type)
            .map_err(|e| NotifierError::RequestFailed {
                endpoint: slot.upload_url.clone(),
                reason: e.to_string(),
            })?;
        let form = multipart::Form::new().part("file", part);
        send_checked(
            &slot.upload_url,
            self.client.post(&slot.upload_url).multipart(form),
            false,
        )?;

        Ok(UploadedFile {
            file_name: slot.file_name,
            file_type: slot.file_type,
            file_url: slot.file_url,
        })
    }

    fn push_file(
        &self,
        file: &UploadedFile,
        title: &str,
        body: &str,
    ) -> Result<(), NotifierError> {
        self.post_push(json!({
            "type": "file",
            "file_name": file.file_name,
            "file_type": file.file_type,
            "file_url": file.file_url,
            "title": title,
            "body": body,
        }))
    }

    fn target(&self) -> String {
        match &self.channel_tag {
            Some(tag) => format!("channel {}", tag),
            None => "account".to_string(),
        }
    }
}

fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, NotifierError> {
    send_checked(endpoint, request, true)
}

// Only the API itself rejects tokens; the upload URL points at storage.
fn send_checked(
    endpoint: &str,
    request: RequestBuilder,
    authenticated: bool,
) -> Result<Response, NotifierError> {
    let response = request.send().map_err(|e| NotifierError::RequestFailed {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if authenticated && (status.as_u16() == 401 || status.as_u16() == 403) {
        return Err(NotifierError::InvalidKey);
    }
    if !status.is_success() {
        return Err(NotifierError::ApiError {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: response.text().unwrap_or_default(),
        });
    }

    Ok(response)
}

fn parse_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, NotifierError> {
    response.json().map_err(|e| NotifierError::RequestFailed {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
