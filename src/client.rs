//! Client for the `POST /api/chat` completion endpoint.
//!
//! The client never lets an untyped payload escape: whatever the endpoint
//! answers is normalized into a single assistant [`Message`] or an
//! [`Error`]. Turning that error into a visible conversation entry is the
//! job of [`error_message`], which the view controller applies at its
//! boundary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{COMPLETION_DURATION, COMPLETION_ERRORS, COMPLETION_REQUESTS};
use crate::protocol::{ChatError, ChatRequest, TUTOR_SYSTEM_PROMPT};
use crate::types::{Message, Reply};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";

/// Upper bound on a single completion round-trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of every assistant entry that reports a failed completion.
///
/// English rendering of the Korean-language client's marker.
pub const ERROR_MARKER: &str = "An error occurred: ";

/// Something that produces the next assistant message for a history.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Return the assistant reply to `history`.
    async fn complete(&self, history: &[Message]) -> Result<Message>;
}

#[async_trait]
impl<C: Completion + ?Sized> Completion for std::sync::Arc<C> {
    async fn complete(&self, history: &[Message]) -> Result<Message> {
        (**self).complete(history).await
    }
}

/// The conversation entry that stands in for a failed completion.
pub fn error_message(err: &Error) -> Message {
    Message::assistant(format!("{ERROR_MARKER}{err}"))
}

/// Returns true if `message` reports a failed completion.
pub fn is_error_message(message: &Message) -> bool {
    message.is_assistant() && message.content.starts_with(ERROR_MARKER)
}

/// HTTP client for the completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    system_prompt: String,
}

impl CompletionClient {
    /// Create a client for `endpoint` with the default timeout and prompt.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_options(endpoint, None, None)
    }

    /// Create a client with custom settings.
    pub fn with_options(
        endpoint: &str,
        timeout: Option<Duration>,
        system_prompt: Option<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| {
                Error::transport(
                    format!("failed to build HTTP client: {e}"),
                    None,
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            client,
            endpoint,
            timeout,
            system_prompt: system_prompt.unwrap_or_else(|| TUTOR_SYSTEM_PROMPT.to_string()),
        })
    }

    /// The endpoint this client posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The instruction prepended to every request.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Post `history` and normalize the answer.
    pub async fn send(&self, history: &[Message]) -> Result<Message> {
        let body = ChatRequest::with_system(&self.system_prompt, history);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, Some(self.timeout.as_secs_f64())))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let status = response.status().as_u16();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest(e, Some(self.timeout.as_secs_f64())))?;
        parse_reply(payload, status)
    }

    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let detail = match response.text().await {
            Ok(body) => match serde_json::from_str::<ChatError>(&body) {
                Ok(parsed) => parsed.error,
                Err(_) if body.trim().is_empty() => status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string(),
                Err(_) => body,
            },
            Err(e) => format!("unreadable response body: {e}"),
        };
        Error::transport(
            format!("completion endpoint returned {}: {detail}", status.as_u16()),
            Some(status.as_u16()),
            None,
        )
    }
}

#[async_trait]
impl Completion for CompletionClient {
    async fn complete(&self, history: &[Message]) -> Result<Message> {
        COMPLETION_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(endpoint = %self.endpoint, messages = history.len(), "requesting completion");
        let result = self.send(history).await;
        COMPLETION_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            COMPLETION_ERRORS.click();
            tracing::warn!(error = %err, "completion failed");
        }
        result
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Normalize a successful response body into an assistant message.
fn parse_reply(payload: Value, status: u16) -> Result<Message> {
    let Value::Object(mut body) = payload else {
        return Err(Error::upstream(
            "response body is not a JSON object",
            Some(status),
        ));
    };
    match body.remove("reply") {
        Some(reply) => Ok(Reply::from(reply).into_message()),
        None => Err(Error::upstream(
            "response body has no reply field",
            Some(status),
        )),
    }
}
