//! MemoDB - A memoization engine with optional durable persistence
//!
//! Wraps operations so repeated calls with equal arguments reuse a previous
//! result until its TTL runs out. Results can be written through to a
//! SQLite file so they survive restarts.
//!
//! ```ignore
//! use std::convert::Infallible;
//! use memodb::{MemoConfig, Memoizer};
//!
//! let memo = Memoizer::new(MemoConfig::default().set_store_path("/tmp/memo.db"));
//! let fib = memo.wrap("fib", |n: &u64| Ok::<_, Infallible>(slow_fib(*n)));
//! fib.call(&40)?; // computed
//! fib.call(&40)?; // cached
//! fib.reset()?;
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod memoizer;
pub mod models;
pub mod store;
pub mod tasks;

pub use cache::{CacheKey, Clock, KeyScope, ManualClock, MemoStats, OperationId, SystemClock};
pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use config::MemoConfig;
pub use error::{InvokeError, MemoError};
pub use invalidation::InvalidationController;
pub use memoizer::{Memoized, Memoizer};
pub use models::StateSnapshot;
pub use store::{DurableRecord, DurableStore};
pub use tasks::{spawn_configured_purge_task, spawn_purge_task};
