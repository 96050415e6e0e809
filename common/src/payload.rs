use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The message served by `GET /api/polling` and consumed by the reader.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PollingData {
    pub message: String,
    /// ISO-8601 instant, millisecond precision, `Z` suffix.
    pub timestamp: String,
}

impl PollingData {
    /// Stamp `message` with the current UTC time.
    pub fn now(message: impl Into<String>) -> Self {
        Self::at(message, Utc::now())
    }

    pub fn at(message: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            timestamp: when.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// `None` when the server sent something that is not RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
