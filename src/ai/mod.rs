use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

mod error;
pub mod prompt;
mod response;
mod schema;
mod transport;


pub use error::{FailureKind, GenerationError, RequestFailure};
pub use prompt::build_instruction;
pub use response::parse_candidates;
pub use transport::{ChatTransport, HttpTransport, MAX_OUTPUT_TOKENS};

use crate::config::{clamp_suggestion_count, GenerationConfig};

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_RETRY_DELAY: u64 = 1000; // milliseconds

/// Waits between attempts. Swapped out in tests so no real time passes.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: INITIAL_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// 1s, 2s, 4s, ... for attempt 0, 1, 2, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.initial_delay.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

/// Produces branch name candidates from repository context.
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn ChatTransport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
}

impl Default for GenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationClient {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(HttpTransport::new()), Arc::new(TokioSleeper))
    }

    pub fn with_parts(transport: Arc<dyn ChatTransport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            transport,
            sleeper,
            retry: RetryPolicy::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Asks the model for branch names.
    ///
    /// An invalid `config` fails before any request is made. Transient
    /// failures are retried with exponential backoff; anything else stops the
    /// loop at once.
    #[instrument(
        skip_all,
        fields(
            model = %config.model,
            has_diff = diff_context.is_some(),
            has_description = description.is_some()
        )
    )]
    pub async fn generate(
        &self,
        config: &GenerationConfig,
        diff_context: Option<&str>,
        description: Option<&str>,
        count_override: Option<u32>,
    ) -> Result<Vec<String>, GenerationError> {
        let validation = config.validate_fields();
        if !validation.valid {
            return Err(GenerationError::Configuration {
                missing: validation.missing_fields,
                invalid: validation.invalid_fields,
            });
        }

        let count = count_override
            .map(clamp_suggestion_count)
            .unwrap_or(config.suggestion_count);
        let instruction = build_instruction(diff_context, description, count);

        let content = self.complete_with_retries(config, &instruction).await?;
        let candidates = parse_candidates(&content, count as usize)?;
        info!(count = candidates.len(), "received branch name suggestions");
        Ok(candidates)
    }

    async fn complete_with_retries(
        &self,
        config: &GenerationConfig,
        instruction: &str,
    ) -> Result<String, GenerationError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            match self.transport.complete(config, instruction).await {
                Ok(content) => return Ok(content),
                Err(failure) => {
                    let attempts = attempt + 1;
                    if !failure.is_transient() {
                        warn!(
                            kind = %failure.kind,
                            attempts,
                            "request failed, not retrying: {}",
                            failure
                        );
                        return Err(GenerationError::Network { attempts, source: failure });
                    }
                    if attempts >= max_attempts {
                        warn!(
                            kind = %failure.kind,
                            attempts,
                            "request failed, retries exhausted: {}",
                            failure
                        );
                        return Err(GenerationError::Network { attempts, source: failure });
                    }

                    let delay = self.retry.delay(attempt);
                    debug!(kind = %failure.kind, attempt, ?delay, "transient failure, retrying");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
