//! Execution ID generation and parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for one orchestrator run.
///
/// Format: `run_{timestamp_ms}_{random_hex}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId {
    timestamp: DateTime<Utc>,
    random: u64,
}

impl ExecutionId {
    /// Generate a new execution ID.
    pub fn new() -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        let mut random = [0u8; 8];
        random.copy_from_slice(&bytes[..8]);

        // Truncate to milliseconds so the ID survives a display/parse round trip
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self {
            timestamp,
            random: u64::from_be_bytes(random),
        }
    }

    /// Get the time the ID was generated.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse an execution ID from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("run_")?;
        let (ts, random_hex) = s.split_once('_')?;

        let ts_millis: i64 = ts.parse().ok()?;
        let timestamp = DateTime::from_timestamp_millis(ts_millis)?;
        if random_hex.len() != 16 {
            return None;
        }
        let random = u64::from_str_radix(random_hex, 16).ok()?;

        Some(Self { timestamp, random })
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_{}_{:016x}",
            self.timestamp.timestamp_millis(),
            self.random
        )
    }
}

impl Serialize for ExecutionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ExecutionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ExecutionId::parse(&s).ok_or_else(|| serde::de::Error::custom("Invalid execution ID format"))
    }
}
