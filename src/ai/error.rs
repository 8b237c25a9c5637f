use std::fmt;
use thiserror::Error;

/// Why a single request attempt failed. The retry loop only looks at this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ConnectionReset,
    ConnectionRefused,
    RateLimited,
    BadGateway,
    ServiceUnavailable,
    Authentication,
    InvalidResponse,
    Api,
    Transport,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionReset
                | Self::ConnectionRefused
                | Self::RateLimited
                | Self::BadGateway
                | Self::ServiceUnavailable
        )
    }

    /// Lowercase message fragments that mark a failure as worth retrying.
    /// Structured information is preferred when the transport has it; this
    /// rule covers errors that only surface as text.
    pub fn from_message(message: &str) -> Option<Self> {
        let message = message.to_lowercase();
        if message.contains("timeout") || message.contains("timed out") {
            Some(Self::Timeout)
        } else if message.contains("econnreset") || message.contains("connection reset") {
            Some(Self::ConnectionReset)
        } else if message.contains("econnrefused") || message.contains("connection refused") {
            Some(Self::ConnectionRefused)
        } else if message.contains("429") {
            Some(Self::RateLimited)
        } else if message.contains("502") {
            Some(Self::BadGateway)
        } else if message.contains("503") {
            Some(Self::ServiceUnavailable)
        } else {
            None
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            401 | 403 => Self::Authentication,
            _ => Self::Api,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection reset",
            Self::ConnectionRefused => "connection refused",
            Self::RateLimited => "rate limited",
            Self::BadGateway => "bad gateway",
            Self::ServiceUnavailable => "service unavailable",
            Self::Authentication => "authentication",
            Self::InvalidResponse => "invalid response",
            Self::Api => "api error",
            Self::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Tags a failure using only its text, falling back to `fallback`.
    pub fn classify(message: impl Into<String>, fallback: FailureKind) -> Self {
        let message = message.into();
        let kind = FailureKind::from_message(&message).unwrap_or(fallback);
        Self { kind, message }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("Request timeout after {}ms", timeout_ms),
        )
    }

    /// Status codes without a dedicated kind still go through the
    /// message-fragment rule, so "504: Gateway Timeout" is retried.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("API request failed with status {}: {}", status, body.trim());
        match FailureKind::from_status(status) {
            fallback @ (FailureKind::Api | FailureKind::Authentication) => {
                Self::classify(message, fallback)
            }
            kind => Self::new(kind, message),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {}", describe_fields(.missing, .invalid))]
    Configuration {
        missing: Vec<String>,
        invalid: Vec<String>,
    },
    #[error("Network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: RequestFailure,
    },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl GenerationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network { source, .. } if source.kind == FailureKind::Timeout)
    }
}

fn describe_fields(missing: &[String], invalid: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        parts.push(format!("invalid {}", invalid.join("; ")));
    }
    parts.join("; ")
}
