//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a memoizer.
//!
//! # Tasks
//! - Purge: Removes expired entries from both cache layers at a fixed or configured interval

mod purge;

pub use purge::{spawn_configured_purge_task, spawn_purge_task};
