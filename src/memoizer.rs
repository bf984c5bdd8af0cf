//! Memoizer Module
//!
//! Read-through/write-through orchestration between the memory layer, the
//! durable store and the wrapped operation.
//!
//! A call moves through three paths:
//! - memory hit: a fresh entry is in memory, returned as is
//! - durable hit: the store has the row, it is loaded into memory and returned if fresh
//! - miss: the operation runs once, the result goes to both layers with a new expiry
//!
//! Calls for the same key are serialized, so concurrent misses run the
//! operation once and the others take the memory hit path afterwards.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKey, Clock, MemoStats, OperationId, StatsRecorder, SystemClock, Timestamp,
};
use crate::codec::{Codec, JsonCodec};
use crate::config::MemoConfig;
use crate::error::{InvokeError, Result};
use crate::invalidation::{Generation, InvalidationController, Layers};
use crate::models::{EntryView, StateSnapshot};
use crate::store::{DurableRecord, DurableStore};

// == Memoizer ==
/// One cache context: a configured scope with its own memory layer,
/// durable store and operation registry.
///
/// Cloning is cheap and every clone shares the same state.
pub struct Memoizer<C: Codec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    codec: C,
    config: MemoConfig,
    clock: Arc<dyn Clock>,
    layers: Arc<Mutex<Layers>>,
    store: Arc<DurableStore>,
    invalidation: InvalidationController,
    inflight: Inflight,
    /// Marked operations and their TTL
    operations: RwLock<HashMap<OperationId, Duration>>,
    stats: StatsRecorder,
}

impl<C: Codec> Clone for Memoizer<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Memoizer<JsonCodec> {
    // == Constructor ==
    /// Creates a memoizer with the JSON codec and the system clock.
    ///
    /// If `config.store_path` is set but the store cannot be opened, the
    /// memoizer runs memory-only.
    pub fn new(config: MemoConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }
}

impl<C: Codec> Memoizer<C> {
    pub fn with_codec(config: MemoConfig, codec: C) -> Self {
        let store = DurableStore::open_or_disabled(config.store_path.as_deref());
        Self::from_parts(config, codec, store, Arc::new(SystemClock))
    }

    /// Assembles a memoizer from explicit collaborators.
    ///
    /// `config.store_path` is ignored here; `store` is used as given.
    pub fn from_parts(
        config: MemoConfig,
        codec: C,
        store: DurableStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let layers = Arc::new(Mutex::new(Layers::default()));
        let store = Arc::new(store);
        let invalidation = InvalidationController::new(layers.clone(), store.clone());

        Self {
            inner: Arc::new(Inner {
                codec,
                config,
                clock,
                layers,
                store,
                invalidation,
                inflight: Inflight::default(),
                operations: RwLock::new(HashMap::new()),
                stats: StatsRecorder::default(),
            }),
        }
    }

    // == Configuration ==
    /// Declares `name` as memoized with the configured TTL for it.
    pub fn mark_operation(&self, name: impl AsRef<str>) -> OperationId {
        let ttl = self.inner.config.ttl_for(name.as_ref());
        self.mark_operation_with_ttl(name, ttl)
    }

    /// Declares `name` as memoized with an explicit TTL.
    pub fn mark_operation_with_ttl(&self, name: impl AsRef<str>, ttl: Duration) -> OperationId {
        let operation = OperationId::new(name);
        self.inner
            .operations
            .write()
            .insert(operation.clone(), ttl);
        debug!("Marked '{}' as memoized (ttl={:?})", operation, ttl);
        operation
    }

    /// Marks `name` with the configured TTL unless it is already marked.
    fn register_operation(&self, name: impl AsRef<str>) -> OperationId {
        let operation = OperationId::new(name.as_ref());
        let mut operations = self.inner.operations.write();
        let ttl = *operations
            .entry(operation.clone())
            .or_insert_with(|| self.inner.config.ttl_for(name.as_ref()));
        debug!("Marked '{}' as memoized (ttl={:?})", operation, ttl);
        operation
    }

    /// Names of all marked operations, sorted.
    pub fn operations(&self) -> Vec<OperationId> {
        let mut operations: Vec<_> = self.inner.operations.read().keys().cloned().collect();
        operations.sort();
        operations
    }

    /// TTL applied to new results of `operation`.
    pub fn ttl(&self, operation: &OperationId) -> Duration {
        self.inner
            .operations
            .read()
            .get(operation)
            .copied()
            .unwrap_or_else(|| self.inner.config.ttl_for(operation.as_str()))
    }

    pub fn config(&self) -> &MemoConfig {
        &self.inner.config
    }

    /// Returns true when results are persisted.
    pub fn is_durable(&self) -> bool {
        self.inner.store.is_enabled()
    }

    // == Wrap ==
    /// Marks `name` and returns a callable that memoizes `func` under it.
    /// A TTL set earlier with [`Memoizer::mark_operation_with_ttl`] is kept.
    ///
    /// # Example
    /// ```ignore
    /// let memo = Memoizer::new(MemoConfig::default());
    /// let square = memo.wrap("square", |n: &u64| Ok::<_, Infallible>(n * n));
    /// assert_eq!(square.call(&4).unwrap(), 16);
    /// ```
    pub fn wrap<A, R, E, F>(&self, name: impl AsRef<str>, func: F) -> Memoized<A, R, E, F, C>
    where
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
        F: Fn(&A) -> std::result::Result<R, E>,
    {
        Memoized {
            operation: self.register_operation(name),
            memoizer: self.clone(),
            func,
            _marker: PhantomData,
        }
    }

    // == Invoke ==
    /// Returns the cached result of `operation(args)` or computes it.
    ///
    /// `compute` runs at most once, and only when neither layer holds a
    /// fresh result. Its error is returned as [`InvokeError::Operation`]
    /// and nothing is cached.
    pub fn invoke<A, R, E, F>(
        &self,
        operation: &OperationId,
        args: &A,
        compute: F,
    ) -> std::result::Result<R, InvokeError<E>>
    where
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<R, E>,
    {
        self.invoke_on(None, operation, args, compute)
    }

    /// Like [`Memoizer::invoke`], on behalf of a specific instance.
    ///
    /// The instance only affects the key under [`KeyScope::Instance`](crate::cache::KeyScope).
    pub fn invoke_on<A, R, E, F>(
        &self,
        instance: Option<&str>,
        operation: &OperationId,
        args: &A,
        compute: F,
    ) -> std::result::Result<R, InvokeError<E>>
    where
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<R, E>,
    {
        let inner = &self.inner;
        let key = CacheKey::make(
            &inner.codec,
            inner.config.key_scope,
            instance,
            operation,
            args,
        )?;

        let slot = inner.inflight.acquire(&key);
        let _running = slot.lock();
        inner.resolve(&key, self.ttl(operation), compute)
    }

    // == Invalidation ==
    /// Handle for clearing cached results.
    pub fn invalidation(&self) -> &InvalidationController {
        &self.inner.invalidation
    }

    /// Clears every cached result of `operation` in both layers.
    pub fn reset(&self, operation: &OperationId) -> Result<()> {
        self.inner.invalidation.reset_operation(operation)
    }

    /// Clears every cached result in both layers.
    pub fn reset_all(&self) -> Result<()> {
        self.inner.invalidation.reset_all()
    }

    /// Removes stale entries from both layers. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        self.inner
            .invalidation
            .purge_expired(self.inner.clock.now())
    }

    // == Diagnostics ==
    pub fn stats(&self) -> MemoStats {
        let total_entries = self.inner.layers.lock().memory.len();
        self.inner.stats.snapshot(total_entries)
    }

    /// Readable snapshot of both layers.
    pub fn dump_state(&self) -> Result<StateSnapshot> {
        let codec = &self.inner.codec;
        let durable = self
            .inner
            .store
            .records()?
            .into_iter()
            .map(|record| EntryView {
                operation: record.operation.to_string(),
                expires_at: record.expires_at,
                args: codec.render(&record.args),
                result: codec.render(&record.result),
            })
            .collect();

        let memory = self
            .inner
            .layers
            .lock()
            .memory
            .iter()
            .map(|(operation, args, entry)| EntryView {
                operation: operation.to_string(),
                expires_at: entry.expires_at,
                args: codec.render(args),
                result: codec.render(&entry.result),
            })
            .collect();

        Ok(StateSnapshot::new(durable, memory))
    }
}

impl<C: Codec> Inner<C> {
    fn resolve<R, E, F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> std::result::Result<R, InvokeError<E>>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<R, E>,
    {
        let now = self.clock.now();
        let (cached, generation) = {
            let layers = self.layers.lock();
            let cached = layers
                .memory
                .get(key)
                .filter(|entry| entry.is_fresh(now))
                .map(|entry| entry.result.clone());
            (cached, layers.generations.current(key.operation()))
        };

        match cached {
            Some(bytes) => match self.codec.decode(&bytes) {
                Ok(value) => {
                    self.stats.record_memory_hit();
                    debug!("Memory hit for '{}'", key.operation());
                    return Ok(value);
                }
                Err(err) => warn!(
                    "Cached result of '{}' is unreadable, recomputing: {}",
                    key.operation(),
                    err
                ),
            },
            None => {
                if let Some(value) = self.hydrate(key, now, generation) {
                    self.stats.record_durable_hit();
                    debug!("Durable hit for '{}'", key.operation());
                    return Ok(value);
                }
            }
        }

        self.stats.record_miss();
        debug!("Miss for '{}', recomputing", key.operation());
        self.recompute(key, ttl, generation, compute)
    }

    /// Loads the durable row for `key` into memory. Returns its value when
    /// it is fresh and decodable.
    fn hydrate<R: DeserializeOwned>(
        &self,
        key: &CacheKey,
        now: Timestamp,
        generation: Generation,
    ) -> Option<R> {
        let record = match self.store.lookup(key.operation(), key.args()) {
            Ok(record) => record?,
            Err(err) => {
                warn!("Durable lookup for '{}' failed: {}", key.operation(), err);
                return None;
            }
        };

        let entry = CacheEntry {
            result: record.result,
            expires_at: record.expires_at,
        };
        let value = if entry.is_fresh(now) {
            match self.codec.decode(&entry.result) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(
                        "Durable result of '{}' is unreadable, recomputing: {}",
                        key.operation(),
                        err
                    );
                    return None;
                }
            }
        } else {
            None
        };

        let mut layers = self.layers.lock();
        if layers.generations.current(key.operation()) == generation {
            layers.memory.put(key, entry);
        }
        value
    }

    fn recompute<R, E, F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        generation: Generation,
        compute: F,
    ) -> std::result::Result<R, InvokeError<E>>
    where
        R: Serialize,
        F: FnOnce() -> std::result::Result<R, E>,
    {
        self.stats.record_recompute();
        let value = compute().map_err(InvokeError::Operation)?;
        let entry = CacheEntry::new(self.codec.encode(&value)?, self.clock.now(), ttl);

        let mut layers = self.layers.lock();
        if layers.generations.current(key.operation()) != generation {
            debug!(
                "'{}' was reset while computing, result not cached",
                key.operation()
            );
            return Ok(value);
        }

        let record = DurableRecord {
            operation: key.operation().clone(),
            expires_at: entry.expires_at,
            args: key.args().to_vec(),
            result: entry.result.clone(),
        };
        if let Err(err) = self.store.upsert(&record) {
            warn!("Durable write for '{}' failed: {}", key.operation(), err);
        }
        layers.memory.put(key, entry);
        Ok(value)
    }
}

// == Memoized ==
/// A wrapped operation. Calls go through the memoizer it came from.
pub struct Memoized<A: ?Sized, R, E, F, C: Codec = JsonCodec> {
    memoizer: Memoizer<C>,
    operation: OperationId,
    func: F,
    _marker: PhantomData<fn(&A) -> std::result::Result<R, E>>,
}

impl<A, R, E, F, C> Memoized<A, R, E, F, C>
where
    A: Serialize + ?Sized,
    R: Serialize + DeserializeOwned,
    F: Fn(&A) -> std::result::Result<R, E>,
    C: Codec,
{
    pub fn call(&self, args: &A) -> std::result::Result<R, InvokeError<E>> {
        self.memoizer
            .invoke(&self.operation, args, || (self.func)(args))
    }

    /// Calls on behalf of `instance`; see [`Memoizer::invoke_on`].
    pub fn call_on(&self, instance: &str, args: &A) -> std::result::Result<R, InvokeError<E>> {
        self.memoizer
            .invoke_on(Some(instance), &self.operation, args, || (self.func)(args))
    }

    /// Clears this operation's cached results.
    pub fn reset(&self) -> Result<()> {
        self.memoizer.reset(&self.operation)
    }

    pub fn operation(&self) -> &OperationId {
        &self.operation
    }
}

// == In-flight Calls ==
/// One mutex per key with a call in progress.
#[derive(Default)]
struct Inflight {
    slots: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl Inflight {
    fn acquire(&self, key: &CacheKey) -> InflightSlot<'_> {
        let slot = self.slots.lock().entry(key.clone()).or_default().clone();
        InflightSlot {
            owner: self,
            key: key.clone(),
            slot,
        }
    }
}

struct InflightSlot<'a> {
    owner: &'a Inflight,
    key: CacheKey,
    slot: Arc<Mutex<()>>,
}

impl InflightSlot<'_> {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.slot.lock()
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock();
        // Only the map and this slot hold it: nobody else is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
