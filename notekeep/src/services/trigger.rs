//! Trigger identity and payload
//!
//! A trigger is keyed by the full `(record id, timestamp)` pair, so two
//! reminders of the same record can never share an identity. Alarm
//! services that only accept a 32-bit request code get one derived from
//! a SHA-256 digest of the pair.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic key used to register and cancel one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId {
    record_id: i64,
    timestamp: i64,
}

impl TriggerId {
    /// Pure function of its inputs: what scheduling creates, cancelling finds.
    pub fn derive(record_id: i64, timestamp: i64) -> Self {
        Self {
            record_id,
            timestamp,
        }
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Narrow request code for platform services keyed on `i32`.
    ///
    /// Collisions are possible at this width; prefer the full identity.
    pub fn request_code(&self) -> i32 {
        let mut hasher = Sha256::new();
        hasher.update(self.record_id.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        let digest = hasher.finalize();
        i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.record_id, self.timestamp)
    }
}

/// What a trigger carries to the notification layer when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub trigger_id: TriggerId,
    pub record_id: i64,
    pub title: String,
    pub body: String,
}

impl TriggerPayload {
    /// Record to open when the user taps the notification
    pub fn navigation_target(&self) -> i64 {
        self.record_id
    }
}
