use async_trait::async_trait;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::RateLimitConfig;
use crate::error::{DispatchError, EndpointError};
use crate::llm::Conversation;
use crate::session::Session;

/// Remote side of a conversation: takes the dialogue state plus the next
/// message and returns the generated reply.
#[async_trait]
pub trait ConversationEndpoint: Send + Sync {
    async fn send(&self, conversation: &mut Conversation, text: &str) -> Result<String, EndpointError>;
}

/// Pacing and backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum gap between a successful request and the next attempt
    pub min_interval: Duration,
    /// Total attempts, first try included
    pub max_retries: u32,
    /// Backoff after attempt `n` is `retry_delay * 2^n`
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&RateLimitConfig> for RetryPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(config.min_interval_secs),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs_f64(config.retry_delay_secs),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// One send operation, reported to the observer as it finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// 0-based
    pub index: u32,
    pub max_attempts: u32,
    /// Pacing delay taken before the call
    pub paced: Duration,
    /// Backoff scheduled before the next attempt, if any
    pub backoff: Option<Duration>,
    pub outcome: AttemptOutcome,
}

type AttemptObserver = Box<dyn Fn(&DispatchAttempt) + Send + Sync>;

/// Sends messages with minimum-interval pacing and exponential backoff on
/// quota exhaustion.
pub struct Dispatcher<E> {
    endpoint: E,
    policy: RetryPolicy,
    observer: Option<AttemptObserver>,
}

impl<E: ConversationEndpoint> Dispatcher<E> {
    pub fn new(endpoint: E, policy: RetryPolicy) -> Self {
        Self {
            endpoint,
            policy,
            observer: None,
        }
    }

    /// Called once per attempt, e.g. to tell the user a retry is coming.
    pub fn with_observer(mut self, observer: impl Fn(&DispatchAttempt) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Send `message` on the session's conversation.
    ///
    /// Only quota exhaustion is retried. Pacing state and the request counter
    /// change on success alone.
    pub async fn dispatch(&self, session: &mut Session, message: &str) -> Result<String, DispatchError> {
        if message.trim().is_empty() {
            return Err(DispatchError::EmptyMessage);
        }

        let max_attempts = self.policy.max_retries.max(1);

        for index in 0..max_attempts {
            let paced = self.pace(session).await;

            match self.endpoint.send(session.conversation_mut(), message).await {
                Ok(reply) => {
                    session.record_success(Instant::now());
                    info!(
                        session = %session.session_id,
                        model = %session.model(),
                        attempt = index + 1,
                        requests = session.request_count(),
                        "dispatch succeeded"
                    );
                    self.report(DispatchAttempt {
                        index,
                        max_attempts,
                        paced,
                        backoff: None,
                        outcome: AttemptOutcome::Success,
                    });
                    return Ok(reply);
                }
                Err(EndpointError::QuotaExhausted(reason)) => {
                    session.mark_rate_limited();
                    let backoff = (index + 1 < max_attempts).then(|| self.policy.backoff(index));

                    warn!(
                        session = %session.session_id,
                        attempt = index + 1,
                        max_attempts,
                        backoff_secs = backoff.map(|b| b.as_secs_f64()),
                        %reason,
                        "quota exhausted"
                    );
                    self.report(DispatchAttempt {
                        index,
                        max_attempts,
                        paced,
                        backoff,
                        outcome: AttemptOutcome::RetryableFailure,
                    });

                    if let Some(wait) = backoff {
                        sleep(wait).await;
                    }
                }
                Err(err) => {
                    warn!(session = %session.session_id, attempt = index + 1, error = %err, "dispatch failed");
                    self.report(DispatchAttempt {
                        index,
                        max_attempts,
                        paced,
                        backoff: None,
                        outcome: AttemptOutcome::FatalFailure,
                    });
                    return Err(err.into());
                }
            }
        }

        Err(DispatchError::RateLimitExceeded { attempts: max_attempts })
    }

    /// Wait out whatever is left of the minimum interval since the last success.
    async fn pace(&self, session: &Session) -> Duration {
        let Some(last) = session.last_request() else {
            return Duration::ZERO;
        };

        let elapsed = last.elapsed();
        if elapsed >= self.policy.min_interval {
            return Duration::ZERO;
        }

        let wait = self.policy.min_interval - elapsed;
        debug!(wait_ms = wait.as_millis() as u64, "pacing request");
        sleep(wait).await;
        wait
    }

    fn report(&self, attempt: DispatchAttempt) {
        debug!(
            attempt = attempt.index + 1,
            paced_ms = attempt.paced.as_millis() as u64,
            outcome = ?attempt.outcome,
            "attempt finished"
        );
        if let Some(observer) = &self.observer {
            observer(&attempt);
        }
    }
}
