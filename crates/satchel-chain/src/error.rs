//! Chain client error types.

use thiserror::Error;

/// Errors surfaced by the chain data client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("transport: {0}")]
    Transport(String),

    /// The indexer answered with a non-success status that is not retried.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Every attempt failed with a transient error.
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Total attempts made, including the first.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied argument was rejected before any request.
    #[error("validation: {0}")]
    Validation(String),
}

impl ChainError {
    /// Whether this failure came from exhausting the retry budget.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ChainError::MaxRetriesExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_http() {
        let e = ChainError::Http {
            status: 400,
            body: "bad request".into(),
        };
        assert_eq!(e.to_string(), "HTTP 400: bad request");
    }

    #[test]
    fn display_max_retries() {
        let e = ChainError::MaxRetriesExceeded {
            attempts: 4,
            last_error: "HTTP 429".into(),
        };
        assert_eq!(
            e.to_string(),
            "max retries exceeded after 4 attempts: HTTP 429"
        );
        assert!(e.is_retry_exhausted());
        assert!(!ChainError::Transport("x".into()).is_retry_exhausted());
    }
}
