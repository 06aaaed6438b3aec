//! Update log and serial assignment.
//!
//! The log is the single source of ordering. Serials are 1-based, strictly
//! increasing and gapless within an epoch; they only restart after
//! [`UpdateLog::clear`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An application payload stamped with broker metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Position in the global order (1-based).
    pub serial: u64,
    /// Log length as observed by the recipient when the update was handed
    /// out. Equals `serial` on live delivery; replay re-stamps it with the
    /// log length at replay time.
    pub max_serial: u64,
    /// Opaque sender payload, passed through unmodified.
    pub payload: Value,
}

/// Append-only ordered history of updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    current_serial: u64,
    entries: Vec<Update>,
}

impl UpdateLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last serial handed out (0 when nothing has been appended).
    pub fn current_serial(&self) -> u64 {
        self.current_serial
    }

    /// Number of entries in the log.
    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in serial order.
    pub fn entries(&self) -> &[Update] {
        &self.entries
    }

    /// Assign the next serial to `payload` and append it.
    ///
    /// Returns a copy of the stored entry.
    pub fn append(&mut self, payload: Value) -> Update {
        self.current_serial += 1;
        let update = Update {
            serial: self.current_serial,
            max_serial: self.len() + 1,
            payload,
        };
        self.entries.push(update.clone());
        update
    }

    /// Entries a caller that has already seen `seen` updates is missing.
    ///
    /// `seen` is a skip count, not a minimum serial. Every returned entry is
    /// re-stamped with the current log length as its `max_serial`. Asking
    /// for more than the log holds yields an empty batch.
    pub fn replay(&self, seen: u64) -> Vec<Update> {
        let max_serial = self.len();
        let skip = usize::try_from(seen).unwrap_or(usize::MAX);

        self.entries
            .iter()
            .skip(skip)
            .map(|update| Update { max_serial, ..update.clone() })
            .collect()
    }

    /// Drop every entry and restart serial assignment from 1.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_serial = 0;
    }
}
