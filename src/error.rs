use thiserror::Error;

/// Failure reported by a conversational endpoint for a single call.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The remote API signalled that our quota is used up. Recoverable by waiting.
    #[error("Resource exhausted: {0}")]
    QuotaExhausted(String),

    /// Anything else: network failures, bad status codes, malformed bodies.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Terminal outcome of a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Rate limit exceeded after {attempts} attempts. Please wait a moment and try again.")]
    RateLimitExceeded { attempts: u32 },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl DispatchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DispatchError::RateLimitExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_names_attempts() {
        let err = DispatchError::RateLimitExceeded { attempts: 3 };
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn transport_errors_keep_their_message() {
        let err: DispatchError = EndpointError::Transport(anyhow::anyhow!("connection reset")).into();
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_rate_limited());
    }
}
