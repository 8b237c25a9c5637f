use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tracing::{debug, instrument};

use super::error::{FailureKind, RequestFailure};
use super::response::extract_content;
use super::schema::{ChatCompletionRequest, ChatMessage};
use crate::config::GenerationConfig;

/// Upper bound on the reply size; a handful of short names never needs more.
pub const MAX_OUTPUT_TOKENS: u32 = 500;

/// One request/response exchange with the generation API.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `instruction` and returns the raw text of the model's reply.
    async fn complete(
        &self,
        config: &GenerationConfig,
        instruction: &str,
    ) -> Result<String, RequestFailure>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn send(
        &self,
        config: &GenerationConfig,
        instruction: &str,
    ) -> Result<String, RequestFailure> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e| {
                RequestFailure::new(FailureKind::Authentication, format!("Invalid API key: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ChatCompletionRequest {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "system",
                content: instruction,
            }],
            temperature: config.temperature,
            max_tokens: MAX_OUTPUT_TOKENS,
            reasoning_effort: config.reasoning_effort,
        };

        let response = self
            .client
            .post(config.chat_completions_url())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(failure_from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(failure_from_reqwest)?;

        if !status.is_success() {
            return Err(RequestFailure::from_status(status.as_u16(), &text));
        }

        extract_content(&text)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    #[instrument(
        skip(self, config, instruction),
        fields(
            model = %config.model,
            timeout_ms = config.timeout_ms,
            instruction_len = instruction.len()
        )
    )]
    async fn complete(
        &self,
        config: &GenerationConfig,
        instruction: &str,
    ) -> Result<String, RequestFailure> {
        let deadline = Duration::from_millis(config.timeout_ms);
        // Elapsing drops the in-flight request future, which aborts the call.
        match tokio::time::timeout(deadline, self.send(config, instruction)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("request exceeded deadline");
                Err(RequestFailure::timeout(config.timeout_ms))
            }
        }
    }
}

fn failure_from_reqwest(error: reqwest::Error) -> RequestFailure {
    let message = describe_reqwest_error(&error);
    let kind = transport_failure_kind(
        &message,
        error.is_timeout(),
        io_error_kind(&error),
        error.is_decode(),
    );
    RequestFailure::new(kind, message)
}

/// Structured signals first, then the message-fragment rule.
fn transport_failure_kind(
    message: &str,
    timed_out: bool,
    io_kind: Option<io::ErrorKind>,
    decode: bool,
) -> FailureKind {
    if timed_out {
        return FailureKind::Timeout;
    }
    match io_kind {
        Some(io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted) => {
            FailureKind::ConnectionReset
        }
        Some(io::ErrorKind::ConnectionRefused) => FailureKind::ConnectionRefused,
        Some(io::ErrorKind::TimedOut) => FailureKind::Timeout,
        Some(_) => FailureKind::from_message(message).unwrap_or(FailureKind::Transport),
        None if decode => FailureKind::InvalidResponse,
        None => FailureKind::from_message(message).unwrap_or(FailureKind::Transport),
    }
}

// reqwest's own Display hides the interesting part of the chain.
fn describe_reqwest_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn io_error_kind(error: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = cause.source();
    }
    None
}
