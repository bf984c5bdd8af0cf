//! State snapshot returned by `dump_state`
//!
//! Human-readable only. Nothing in the engine reads it back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::Timestamp;

/// One cached result, with its blobs rendered by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    /// Operation name
    pub operation: String,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: Timestamp,
    /// Rendered argument tuple
    pub args: String,
    /// Rendered result value
    pub result: String,
}

impl fmt::Display for EntryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.operation, self.expires_at, self.args, self.result
        )
    }
}

/// Every entry of both layers at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Rows of the durable store, empty when durability is off
    pub durable: Vec<EntryView>,
    /// Entries of the in-memory layer, sorted by operation then args
    pub memory: Vec<EntryView>,
}

impl StateSnapshot {
    pub fn new(durable: Vec<EntryView>, mut memory: Vec<EntryView>) -> Self {
        memory.sort_by(|a, b| (&a.operation, &a.args).cmp(&(&b.operation, &b.args)));
        Self {
            generated_at: Utc::now(),
            durable,
            memory,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.durable.is_empty() && self.memory.is_empty()
    }
}

/// Durable rows one per line as `operation;expires_at;args;result`, then a
/// `//` separator, then memory entries in the same format.
impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.durable {
            writeln!(f, "{}", entry)?;
        }
        write!(f, "//")?;
        for entry in &self.memory {
            write!(f, "\n{}", entry)?;
        }
        Ok(())
    }
}
