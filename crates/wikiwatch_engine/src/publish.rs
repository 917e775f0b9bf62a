use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use thiserror::Error;

/// Publish failure taxonomy the dispatcher's policy table keys on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Soft pacing complaint from the provider; retried without logging.
    #[error("posting too fast")]
    TooFast,
    /// Reserved provider signal for hard rate limiting; triggers the
    /// global cooldown.
    #[error("provider throttled the account")]
    Throttled,
    #[error("publish failed: {0}")]
    Other(String),
}

/// Submits one caption plus picture to the social platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, caption: &str, image: &Path) -> Result<(), PublishError>;
}

/// Provider error code meaning "update too fast".
const TOO_FAST_CODE: i64 = 20016;
/// Provider error code meaning the API quota is exhausted.
const THROTTLE_CODE: i64 = 10023;

/// Reqwest implementation posting a multipart status+picture upload to the
/// provider's share endpoint and folding its error codes into
/// [`PublishError`].
pub struct StatusPublisher {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl StatusPublisher {
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl Publisher for StatusPublisher {
    async fn publish(&self, caption: &str, image: &Path) -> Result<(), PublishError> {
        let picture = tokio::fs::read(image)
            .await
            .map_err(|err| PublishError::Other(format!("cannot read picture: {err}")))?;
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "post.jpg".to_string());

        let form = multipart::Form::new()
            .text("access_token", self.access_token.clone())
            .text("status", caption.to_string())
            .part(
                "pic",
                multipart::Part::bytes(picture)
                    .file_name(file_name)
                    .mime_str("image/jpeg")
                    .map_err(|err| PublishError::Other(err.to_string()))?,
            );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PublishError::Other(err.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|err| PublishError::Other(err.to_string()))?;
        classify_response(&body)
    }
}

/// The provider answers 200 with an error object on failure; a missing
/// `error_code` field means the post went through.
fn classify_response(body: &str) -> Result<(), PublishError> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => return Err(PublishError::Other(format!("unreadable response: {err}"))),
    };
    match value.get("error_code").and_then(serde_json::Value::as_i64) {
        None => Ok(()),
        Some(TOO_FAST_CODE) => Err(PublishError::TooFast),
        Some(THROTTLE_CODE) => Err(PublishError::Throttled),
        Some(code) => {
            let message = value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            Err(PublishError::Other(format!("{code} {message}")))
        }
    }
}
