//! Diagnostic views of memoizer state
//!
//! Serializable projections used by `dump_state` and the admin binary.

pub mod snapshot;

// Re-export commonly used types
pub use snapshot::{EntryView, StateSnapshot};
