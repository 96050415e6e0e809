use reqwest::StatusCode;
use thiserror::Error;

/// Why a polling cycle did not deliver a payload.
#[derive(Debug, Error)]
pub enum PollError {
    /// `stop()` was called while the cycle was in flight.
    #[error("polling cancelled")]
    Cancelled,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to fetch data: HTTP {0}")]
    Status(StatusCode),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The consumer callback returned an error or panicked.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl PollError {
    /// Cancellation ends the loop; everything else is transient.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancellation_is_terminal() {
        assert!(PollError::Cancelled.is_cancelled());
        assert!(!PollError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_cancelled());
        assert!(!PollError::Delivery("boom".into()).is_cancelled());

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!PollError::from(decode).is_cancelled());
    }

    #[test]
    fn test_status_message() {
        let err = PollError::Status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to fetch data: HTTP 500 Internal Server Error");
    }
}
