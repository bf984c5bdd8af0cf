//! Invalidation Module
//!
//! Explicit removal of cached results from both layers.
//!
//! Every reset bumps a generation counter. A recompute remembers the
//! generation it started under and drops its write if a reset happened in
//! between, so an invalidation cannot be undone by a call that was already
//! in flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::{MemoryCache, OperationId, Timestamp};
use crate::error::Result;
use crate::store::DurableStore;

// == Generations ==
/// Opaque marker of "no reset since": (global epoch, per-operation counter).
pub(crate) type Generation = (u64, u64);

#[derive(Debug, Default)]
pub(crate) struct Generations {
    epoch: u64,
    per_operation: HashMap<OperationId, u64>,
}

impl Generations {
    pub fn current(&self, operation: &OperationId) -> Generation {
        (
            self.epoch,
            self.per_operation.get(operation).copied().unwrap_or(0),
        )
    }

    fn bump(&mut self, operation: &OperationId) {
        *self.per_operation.entry(operation.clone()).or_insert(0) += 1;
    }

    fn bump_all(&mut self) {
        self.epoch += 1;
        self.per_operation.clear();
    }
}

/// The memory layer plus its generation bookkeeping, guarded together.
#[derive(Debug, Default)]
pub(crate) struct Layers {
    pub memory: MemoryCache,
    pub generations: Generations,
}

// == Invalidation Controller ==
/// Clears cached results for one operation or for everything.
///
/// On return from a reset, the next call in that scope recomputes.
#[derive(Debug, Clone)]
pub struct InvalidationController {
    layers: Arc<Mutex<Layers>>,
    store: Arc<DurableStore>,
}

impl InvalidationController {
    pub(crate) fn new(layers: Arc<Mutex<Layers>>, store: Arc<DurableStore>) -> Self {
        Self { layers, store }
    }

    // == Reset Operation ==
    /// Drops every cached result of `operation`, then compacts the store.
    pub fn reset_operation(&self, operation: &OperationId) -> Result<()> {
        let (memory, durable) = {
            let mut layers = self.layers.lock();
            layers.generations.bump(operation);
            let memory = layers.memory.delete_by_operation(operation);
            let durable = self.store.delete_by_operation(operation)?;
            (memory, durable)
        };
        self.store.compact()?;

        info!(
            "Reset '{}': removed {} memory entries, {} durable records",
            operation, memory, durable
        );
        Ok(())
    }

    // == Reset All ==
    /// Drops every cached result, then compacts the store.
    pub fn reset_all(&self) -> Result<()> {
        let (memory, durable) = {
            let mut layers = self.layers.lock();
            layers.generations.bump_all();
            let memory = layers.memory.clear();
            let durable = self.store.clear_all()?;
            (memory, durable)
        };
        self.store.compact()?;

        info!(
            "Reset all: removed {} memory entries, {} durable records",
            memory, durable
        );
        Ok(())
    }

    // == Purge Expired ==
    /// Removes entries that are stale at `now` from both layers.
    ///
    /// Fresh entries are untouched, so no generation is bumped. Returns the
    /// total number of entries removed.
    pub fn purge_expired(&self, now: Timestamp) -> Result<usize> {
        let (memory, durable) = {
            let mut layers = self.layers.lock();
            let memory = layers.memory.purge_expired(now);
            let durable = self.store.purge_expired(now)?;
            (memory, durable)
        };
        if durable > 0 {
            self.store.compact()?;
        }

        if memory + durable > 0 {
            info!(
                "Purge: removed {} memory entries, {} durable records",
                memory, durable
            );
        } else {
            debug!("Purge: no expired entries found");
        }
        Ok(memory + durable)
    }
}
