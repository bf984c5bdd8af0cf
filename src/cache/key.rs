//! Cache Key Module
//!
//! Identifies a reusable result: which operation, called with which
//! arguments, and optionally from which instance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Result;

// == Operation Id ==
/// Stable name of a memoized operation. Each distinct name is its own
/// cache partition, and the name is what the durable store records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(Arc<str>);

impl OperationId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OperationId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

// == Key Scope ==
/// Whether callers on different instances share cached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// Key is (operation, args): every instance sees the same cache
    #[default]
    Type,
    /// Key is (operation, instance, args): each instance caches separately
    Instance,
}

impl FromStr for KeyScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "type" => Ok(KeyScope::Type),
            "instance" => Ok(KeyScope::Instance),
            other => Err(format!("unknown key scope '{}'", other)),
        }
    }
}

// == Cache Key ==
/// Composite of an operation and its encoded argument tuple.
///
/// Under [`KeyScope::Instance`] the instance identifier is folded into the
/// encoded arguments, so the durable `(operation, args)` key stays unique
/// without a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: OperationId,
    args: Vec<u8>,
}

impl CacheKey {
    // == Make ==
    /// Derives the key for one call.
    ///
    /// # Arguments
    /// * `codec` - Encoding for the argument tuple
    /// * `scope` - Whether `instance` takes part in the key
    /// * `instance` - Identifier of the calling instance, if any
    /// * `operation` - The operation being called
    /// * `args` - Ordered argument tuple
    pub fn make<C, A>(
        codec: &C,
        scope: KeyScope,
        instance: Option<&str>,
        operation: &OperationId,
        args: &A,
    ) -> Result<Self>
    where
        C: Codec,
        A: Serialize + ?Sized,
    {
        let args = match scope {
            KeyScope::Type => codec.encode(args)?,
            KeyScope::Instance => codec.encode(&(instance, args))?,
        };

        Ok(Self {
            operation: operation.clone(),
            args,
        })
    }

    /// Rebuilds a key from its stored parts.
    pub fn from_parts(operation: OperationId, args: Vec<u8>) -> Self {
        Self { operation, args }
    }

    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// Encoded argument bytes, as stored in the durable `args` column.
    pub fn args(&self) -> &[u8] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;

    fn key(scope: KeyScope, instance: Option<&str>, op: &str, args: &(u32, &str)) -> CacheKey {
        CacheKey::make(&JsonCodec, scope, instance, &OperationId::new(op), args).unwrap()
    }

    #[test]
    fn test_equal_calls_produce_equal_keys() {
        let a = key(KeyScope::Type, None, "fib", &(10, "x"));
        let b = key(KeyScope::Type, None, "fib", &(10, "x"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_operations_are_separate() {
        let a = key(KeyScope::Type, None, "fib", &(10, "x"));
        let b = key(KeyScope::Type, None, "fact", &(10, "x"));
        assert_ne!(a, b);
        assert_eq!(a.args(), b.args());
    }

    #[test]
    fn test_distinct_args_are_separate() {
        let a = key(KeyScope::Type, None, "fib", &(10, "x"));
        let b = key(KeyScope::Type, None, "fib", &(11, "x"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_scope_ignores_instance() {
        let a = key(KeyScope::Type, Some("a"), "fib", &(1, "x"));
        let b = key(KeyScope::Type, Some("b"), "fib", &(1, "x"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_instance_scope_separates_instances() {
        let a = key(KeyScope::Instance, Some("a"), "fib", &(1, "x"));
        let b = key(KeyScope::Instance, Some("b"), "fib", &(1, "x"));
        let shared = key(KeyScope::Instance, None, "fib", &(1, "x"));
        assert_ne!(a, b);
        assert_ne!(a, shared);
    }

    #[test]
    fn test_key_scope_from_str() {
        assert_eq!("type".parse::<KeyScope>(), Ok(KeyScope::Type));
        assert_eq!(" Instance ".parse::<KeyScope>(), Ok(KeyScope::Instance));
        assert!("class".parse::<KeyScope>().is_err());
    }

    #[test]
    fn test_operation_id_display() {
        let op = OperationId::from("inc".to_string());
        assert_eq!(op.to_string(), "inc");
        assert_eq!(op, OperationId::from("inc"));
    }
}
