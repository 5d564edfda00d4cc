//! In-memory reference implementation of [`TransactionEngine`].

mod collection;
mod lock;
mod transaction;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use self::collection::Collection;
use self::lock::LockManager;
pub use self::transaction::MemoryTransaction;
use crate::collections::CollectionSet;
use crate::error::{TransactionError, TransactionResult};
use crate::id::{IdGenerator, TransactionId};
use crate::options::TransactionOptions;
use crate::transaction::{TransactionEngine, TransactionRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Seconds to wait for collection locks when a transaction does not set `lockTimeout`.
    pub default_lock_timeout: f64,
    /// Size limit applied to transactions that do not set `maxTransactionSize`.
    pub max_transaction_size: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_lock_timeout: kestrel_common::constants::DEFAULT_LOCK_TIMEOUT,
            max_transaction_size: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    collections: DashMap<String, Arc<Collection>>,
    pub(crate) locks: LockManager,
    txn_ids: IdGenerator,
    pub(crate) revisions: IdGenerator,
    pub(crate) keys: IdGenerator,
    pub(crate) stats: EngineStats,
}

impl EngineInner {
    pub(crate) fn collection(&self, name: &str) -> TransactionResult<Arc<Collection>> {
        self.collections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransactionError::CollectionNotFound(name.to_string()))
    }
}

/// A transaction engine keeping all collections in memory.
///
/// Cloning is cheap; clones share the same collections.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

impl MemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        info!(?config, "memory engine created");
        Self {
            inner: Arc::new(EngineInner {
                config,
                collections: DashMap::new(),
                locks: LockManager::new(),
                txn_ids: IdGenerator::new(),
                revisions: IdGenerator::new(),
                keys: IdGenerator::new(),
                stats: EngineStats::default(),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn create_collection(&self, name: &str) -> TransactionResult<()> {
        match self.inner.collections.entry(name.to_string()) {
            dashmap::Entry::Occupied(_) => {
                Err(TransactionError::DuplicateCollection(name.to_string()))
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(Arc::new(Collection::new(name.to_string())));
                debug!(collection = name, "collection created");
                Ok(())
            }
        }
    }

    pub fn drop_collection(&self, name: &str) -> TransactionResult<()> {
        self.inner
            .collections
            .remove(name)
            .map(|_| debug!(collection = name, "collection dropped"))
            .ok_or_else(|| TransactionError::CollectionNotFound(name.to_string()))
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.contains_key(name)
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of committed documents in `name`.
    pub fn committed_count(&self, name: &str) -> TransactionResult<u64> {
        Ok(self.inner.collection(name)?.len() as u64)
    }

    pub fn committed_document(&self, name: &str, key: &str) -> TransactionResult<Option<Value>> {
        Ok(self.inner.collection(name)?.get(key))
    }

    /// Number of transactions committed so far.
    pub fn committed_transactions(&self) -> u64 {
        self.inner.stats.committed.load(Ordering::Relaxed)
    }

    /// Number of transactions aborted so far, including those that failed to begin.
    pub fn aborted_transactions(&self) -> u64 {
        self.inner.stats.aborted.load(Ordering::Relaxed)
    }

    /// Constructs a concrete transaction, for callers that do not need a trait object.
    pub fn transaction(
        &self,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> TransactionResult<MemoryTransaction> {
        let id = TransactionId::new(self.inner.txn_ids.next()?);
        Ok(MemoryTransaction::new(
            id,
            self.inner.clone(),
            collections,
            options,
        ))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TransactionEngine for MemoryEngine {
    fn construct(
        &self,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> TransactionResult<TransactionRef> {
        Ok(Arc::new(self.transaction(collections, options)?))
    }
}
