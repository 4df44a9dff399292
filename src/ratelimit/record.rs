//! Persisted attempt state for a single limiter key.

use serde::{Deserialize, Serialize};

use crate::error::{BloomError, Result};

/// Attempts recorded in the current window and when that window ends.
///
/// Serialized as `{"attempts": <int>, "resetTime": <epoch ms>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Attempts recorded in the current window (at least 1)
    pub attempts: u32,
    /// Epoch milliseconds at which the window expires
    pub reset_time: i64,
}

impl AttemptRecord {
    /// Open a new window at `now` with a single attempt recorded.
    pub fn first(now: i64, window_ms: u64) -> Self {
        Self {
            attempts: 1,
            reset_time: now.saturating_add(i64::try_from(window_ms).unwrap_or(i64::MAX)),
        }
    }

    /// Whether the window has expired at `now`.
    ///
    /// The window is still live at exactly `reset_time`.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.reset_time
    }

    /// The same window with one more attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            reset_time: self.reset_time,
        }
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(BloomError::Record)
    }

    /// Decode a stored value.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(BloomError::Record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_record() {
        let record = AttemptRecord::first(1_000, 60_000);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.reset_time, 61_000);
    }

    #[test]
    fn test_oversized_window_saturates() {
        let record = AttemptRecord::first(0, u64::MAX);
        assert_eq!(record.reset_time, i64::MAX);
        assert!(!record.is_expired(0));
    }

    #[test]
    fn test_expiry_is_strict() {
        let record = AttemptRecord::first(0, 1_000);
        assert!(!record.is_expired(999));
        assert!(!record.is_expired(1_000));
        assert!(record.is_expired(1_001));
    }

    #[test]
    fn test_next_attempt_keeps_window() {
        let record = AttemptRecord::first(0, 1_000).next_attempt().next_attempt();
        assert_eq!(record.attempts, 3);
        assert_eq!(record.reset_time, 1_000);
    }

    #[test]
    fn test_wire_format_field_names() {
        let record = AttemptRecord {
            attempts: 2,
            reset_time: 1_700_000_000_000,
        };
        assert_eq!(
            record.encode().unwrap(),
            r#"{"attempts":2,"resetTime":1700000000000}"#
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            AttemptRecord::decode("{\"attempts\":\"many\"}"),
            Err(BloomError::Record(_))
        ));
        assert!(AttemptRecord::decode("").is_err());
    }
}
