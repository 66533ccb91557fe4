//! Error types for the scoring engine.
//!
//! Only configuration problems and unusable requests surface to callers.
//! Transport and detector failures stay inside their agent and become
//! abstentions.

use thiserror::Error;

/// Errors that can escape the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The registry or engine configuration is inconsistent. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request failed validation and no agent can run on what is left.
    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of a call to a third-party classification service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("service returned no usable answer")]
    Empty,

    #[error("call cancelled")]
    Cancelled,

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::Other(_) => true,
            TransportError::Decode(_) | TransportError::Empty | TransportError::Cancelled => false,
        }
    }
}

/// Failure inside a local heuristic detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The request carries none of the features this detector scores.
    #[error("no usable signal: {0}")]
    InsufficientSignal(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Timeout(100).is_retryable());
        assert!(TransportError::Connect("x".into()).is_retryable());
        assert!(TransportError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!TransportError::Status {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!TransportError::Decode("bad".into()).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::Configuration("weights sum to 0.9".to_string());
        assert_eq!(err.to_string(), "configuration error: weights sum to 0.9");
    }
}
