//! Chat-completion client: sends the transcript to the inference
//! endpoint and returns the assistant's reply

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::transcript::{Role, Turn};
use crate::{Error, Result};

/// Request body for the chat-completion endpoint. Streaming is always
/// disabled; the session consumes whole replies.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [Turn],
}

/// Response body; every field other than `message` is ignored
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Client for a local chat-completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    url: String,
    model: String,
}

impl ChatClient {
    /// Create a client for `url`, tagging requests with `model`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;

        Ok(Self { http, url: url.into(), model: model.into() })
    }

    /// Create a client from session configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.chat_url, &config.model, config.request_timeout)
    }

    /// Send the full ordered turn sequence and return the single
    /// assistant turn it produces. One outstanding request per call; the
    /// configured timeout bounds it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Inference` on transport failure, a non-success
    /// status, or a response that does not contain a well-formed
    /// assistant message. No partial result is ever returned.
    pub async fn complete(&self, turns: &[Turn]) -> Result<Turn> {
        let request = ChatRequest { model: &self.model, stream: false, messages: turns };

        tracing::debug!(model = %self.model, turns = turns.len(), "requesting chat completion");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Inference(format!("endpoint returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Inference(format!("failed to read response body: {e}")))?;

        parse_reply(&body)
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Validate a response body and extract the assistant turn. Any shape
/// mismatch is an inference failure; nothing unvalidated reaches the
/// transcript.
fn parse_reply(body: &[u8]) -> Result<Turn> {
    let response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Inference(format!("malformed response body: {e}")))?;

    if Role::from_str(&response.message.role) != Some(Role::Assistant) {
        return Err(Error::Inference(format!(
            "unexpected reply role: {}",
            response.message.role
        )));
    }

    Ok(Turn::assistant(response.message.content))
}
