//! Record Codec
//!
//! Each record occupies one line of the backing file:
//!
//! ```text
//! <key>#@@@#<serialized value>###<ttl seconds>###<created at, unix millis>
//! ```
//!
//! The key is separated from the rest by [`KEY_DELIMITER`]; the value, TTL and
//! creation time are separated by [`FIELD_DELIMITER`].
//!
//! ## Format limitations
//!
//! Neither delimiter is escaped. A key containing `#@@@#`, or a key or value
//! containing a line break, will not survive a round trip. Values containing
//! either delimiter are fine: the key is split off at the first `#@@@#` and
//! the trailing numeric fields are split off from the right.

use crate::error::{StorageError, StorageResult};
use std::time::{SystemTime, UNIX_EPOCH};

/// Separates the key from the rest of the line.
pub const KEY_DELIMITER: &str = "#@@@#";

/// Separates the value, TTL and creation time.
pub const FIELD_DELIMITER: &str = "###";

/// One stored key/value/ttl/created-at tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The record key
    pub key: String,
    /// The serialized document
    pub value: String,
    /// Time-to-live in seconds, `0` means never expires
    pub ttl_seconds: u64,
    /// Wall-clock creation time in milliseconds since the Unix epoch
    pub created_at: u64,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl_seconds,
            created_at: now_millis(),
        }
    }

    /// Returns true if the record carries a TTL.
    #[inline]
    pub fn has_ttl(&self) -> bool {
        self.ttl_seconds > 0
    }

    /// Milliseconds of life left at `now` (unix millis).
    ///
    /// Returns `None` for records without a TTL and `Some(0)` once expired.
    pub fn remaining_ms(&self, now: u64) -> Option<u64> {
        if !self.has_ttl() {
            return None;
        }
        let expires_at = self
            .created_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000));
        Some(expires_at.saturating_sub(now))
    }

    /// Checks if the record has expired at `now` (unix millis).
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.remaining_ms(now) == Some(0)
    }

    /// Encodes this record as a single line, without the line terminator.
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(
            self.key.len() + self.value.len() + KEY_DELIMITER.len() + 2 * FIELD_DELIMITER.len() + 24,
        );
        line.push_str(&self.key);
        line.push_str(KEY_DELIMITER);
        line.push_str(&self.value);
        line.push_str(FIELD_DELIMITER);
        line.push_str(&self.ttl_seconds.to_string());
        line.push_str(FIELD_DELIMITER);
        line.push_str(&self.created_at.to_string());
        line
    }

    /// Decodes one line of the backing file.
    ///
    /// A trailing `\r` is tolerated so files edited on Windows still load.
    pub fn decode(line: &str) -> StorageResult<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let (key, rest) = line
            .split_once(KEY_DELIMITER)
            .ok_or_else(|| StorageError::malformed("missing key delimiter"))?;

        let mut fields = rest.rsplitn(3, FIELD_DELIMITER);
        let created_at = fields.next();
        let ttl = fields.next();
        let value = fields.next();

        let (value, ttl, created_at) = match (value, ttl, created_at) {
            (Some(value), Some(ttl), Some(created_at)) => (value, ttl, created_at),
            _ => {
                return Err(StorageError::malformed(format!(
                    "expected value, ttl and created-at fields for key {:?}",
                    key
                )))
            }
        };

        let ttl_seconds = ttl.parse::<u64>().map_err(|_| {
            StorageError::malformed(format!("invalid ttl {:?} for key {:?}", ttl, key))
        })?;
        let created_at = created_at.parse::<u64>().map_err(|_| {
            StorageError::malformed(format!(
                "invalid created-at {:?} for key {:?}",
                created_at, key
            ))
        })?;

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            ttl_seconds,
            created_at,
        })
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
