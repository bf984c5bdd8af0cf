//! Configuration Module
//!
//! Per-scope setup: where results persist, how long they live, and whether
//! instances share a cache.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{KeyScope, DEFAULT_TTL_SECS};

/// Memoizer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct MemoConfig {
    /// SQLite database file; `None` keeps the cache memory-only
    pub store_path: Option<PathBuf>,
    /// TTL applied to every operation without an override
    pub default_ttl: Duration,
    /// Per-operation TTL overrides, keyed by operation name
    pub operation_ttls: HashMap<String, Duration>,
    /// Whether instances share cached results
    pub key_scope: KeyScope,
    /// Interval of the background purge task, if one should run
    pub purge_interval: Option<Duration>,
}

impl MemoConfig {
    /// Creates a new MemoConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_STORE_PATH` - Durable store file (default: none, memory-only)
    /// - `MEMO_TTL_SECS` - Default TTL in seconds (default: 1000000)
    /// - `MEMO_KEY_SCOPE` - `type` or `instance` (default: type)
    /// - `MEMO_PURGE_INTERVAL_SECS` - Purge task interval (default: no task)
    pub fn from_env() -> Self {
        Self {
            store_path: env::var("MEMO_STORE_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            default_ttl: Duration::from_secs(
                env::var("MEMO_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TTL_SECS),
            ),
            operation_ttls: HashMap::new(),
            key_scope: env::var("MEMO_KEY_SCOPE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            purge_interval: env::var("MEMO_PURGE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    // == Builders ==
    pub fn set_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn set_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Overrides the TTL of a single operation.
    pub fn set_operation_ttl(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.operation_ttls.insert(operation.into(), ttl);
        self
    }

    pub fn set_key_scope(mut self, scope: KeyScope) -> Self {
        self.key_scope = scope;
        self
    }

    pub fn set_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = Some(interval);
        self
    }

    /// TTL in effect for `operation`.
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.operation_ttls
            .get(operation)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            operation_ttls: HashMap::new(),
            key_scope: KeyScope::Type,
            purge_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = MemoConfig::default();
        assert!(config.store_path.is_none());
        assert_eq!(config.default_ttl, Duration::from_secs(1_000_000));
        assert_eq!(config.key_scope, KeyScope::Type);
        assert!(config.purge_interval.is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MEMO_STORE_PATH");
        env::remove_var("MEMO_TTL_SECS");
        env::remove_var("MEMO_KEY_SCOPE");
        env::remove_var("MEMO_PURGE_INTERVAL_SECS");

        let config = MemoConfig::from_env();
        assert!(config.store_path.is_none());
        assert_eq!(config.default_ttl, Duration::from_secs(DEFAULT_TTL_SECS));
        assert_eq!(config.key_scope, KeyScope::Type);
        assert!(config.purge_interval.is_none());
    }

    #[test]
    fn test_operation_ttl_override() {
        let config = MemoConfig::default()
            .set_ttl(Duration::from_secs(10))
            .set_operation_ttl("slow", Duration::from_secs(60));

        assert_eq!(config.ttl_for("slow"), Duration::from_secs(60));
        assert_eq!(config.ttl_for("fast"), Duration::from_secs(10));
    }

    #[test]
    fn test_builders() {
        let config = MemoConfig::default()
            .set_store_path("/tmp/memo.db")
            .set_key_scope(KeyScope::Instance)
            .set_purge_interval(Duration::from_secs(30));

        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/memo.db")));
        assert_eq!(config.key_scope, KeyScope::Instance);
        assert_eq!(config.purge_interval, Some(Duration::from_secs(30)));
    }
}
