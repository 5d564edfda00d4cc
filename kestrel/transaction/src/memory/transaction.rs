use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::EngineInner;
use super::collection::{self, Collection, ID, KEY, REV};
use crate::collections::{AccessMode, CollectionSet};
use crate::error::{TransactionError, TransactionResult};
use crate::id::TransactionId;
use crate::options::TransactionOptions;
use crate::transaction::{TransactionHandle, TransactionStatus};

/// Per-collection buffer of uncommitted writes. `None` marks a removal.
type WriteSet = BTreeMap<String, BTreeMap<String, Option<Value>>>;

#[derive(Debug, Default)]
struct TxnState {
    status: TransactionStatus,
    /// Locks held, with the mode each was acquired in.
    locked: BTreeMap<String, AccessMode>,
    writes: WriteSet,
    /// Bytes buffered since the transaction began.
    total_bytes: u64,
    /// Bytes and operations buffered since the last intermediate commit.
    pending_bytes: u64,
    pending_ops: u64,
}

/// A transaction of the [`MemoryEngine`](super::MemoryEngine).
///
/// Writes are buffered per transaction and become visible to others on commit. Collection locks
/// are taken in name order on begin; undeclared collections may be read lazily when the options
/// allow implicit collections.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: TransactionId,
    engine: Arc<EngineInner>,
    collections: CollectionSet,
    options: TransactionOptions,
    state: Mutex<TxnState>,
}

impl MemoryTransaction {
    pub(super) fn new(
        id: TransactionId,
        engine: Arc<EngineInner>,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> Self {
        Self {
            id,
            engine,
            collections,
            options,
            state: Mutex::new(TxnState::default()),
        }
    }

    fn lock_timeout(&self) -> f64 {
        self.engine.config.default_lock_timeout
    }

    fn max_transaction_size(&self) -> Option<u64> {
        self.options
            .max_transaction_size
            .or(self.engine.config.max_transaction_size)
    }

    fn ensure_running(state: &TxnState) -> TransactionResult<()> {
        match state.status {
            TransactionStatus::Running => Ok(()),
            TransactionStatus::Aborted => Err(TransactionError::Aborted),
            actual => Err(TransactionError::InvalidState {
                expected: TransactionStatus::Running,
                actual,
            }),
        }
    }

    /// Resolves `name` for an operation that needs `mode`, taking a read lock on undeclared
    /// collections when implicit collections are allowed.
    fn access(
        &self,
        state: &mut TxnState,
        name: &str,
        mode: AccessMode,
    ) -> TransactionResult<Arc<Collection>> {
        Self::ensure_running(state)?;
        let collection = self.engine.collection(name)?;
        match state.locked.get(name) {
            Some(held) if *held >= mode => Ok(collection),
            None if mode == AccessMode::Read && self.options.allows_implicit_collections() => {
                let deadline = self.options.lock_deadline(self.lock_timeout());
                self.engine
                    .locks
                    .acquire(self.id, name, AccessMode::Read, deadline)?;
                trace!(txn = %self.id, collection = name, "implicitly added collection");
                state.locked.insert(name.to_string(), AccessMode::Read);
                Ok(collection)
            }
            _ => Err(TransactionError::UnregisteredCollection {
                collection: name.to_string(),
                mode,
            }),
        }
    }

    fn visible(state: &TxnState, collection: &Collection, key: &str) -> Option<Value> {
        match state
            .writes
            .get(collection.name())
            .and_then(|writes| writes.get(key))
        {
            Some(buffered) => buffered.clone(),
            None => collection.get(key),
        }
    }

    /// Buffers a write, enforcing the size limit and publishing early when an intermediate
    /// commit threshold is reached.
    fn buffer(
        &self,
        state: &mut TxnState,
        collection: &str,
        key: &str,
        document: Option<Value>,
    ) -> TransactionResult<()> {
        let size = document.as_ref().map_or(key.len(), |d| d.to_string().len()) as u64;
        if let Some(limit) = self.max_transaction_size() {
            if state.total_bytes.saturating_add(size) > limit {
                warn!(txn = %self.id, limit, "transaction size limit reached");
                self.finish_abort(state);
                return Err(TransactionError::SizeLimit { limit });
            }
        }
        state
            .writes
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
        state.total_bytes += size;
        state.pending_bytes += size;
        state.pending_ops += 1;

        let by_size = self
            .options
            .intermediate_commit_size
            .is_some_and(|threshold| state.pending_bytes >= threshold);
        let by_count = self
            .options
            .intermediate_commit_count
            .is_some_and(|threshold| state.pending_ops >= threshold);
        if by_size || by_count {
            debug!(
                txn = %self.id,
                operations = state.pending_ops,
                bytes = state.pending_bytes,
                "intermediate commit"
            );
            self.publish(state);
        }
        Ok(())
    }

    fn publish(&self, state: &mut TxnState) {
        for (name, writes) in std::mem::take(&mut state.writes) {
            // Locked collections cannot be dropped, so the lookup only fails for an engine that
            // was torn down underneath the transaction.
            if let Ok(collection) = self.engine.collection(&name) {
                collection.apply(writes);
            }
        }
        state.pending_bytes = 0;
        state.pending_ops = 0;
    }

    fn release(&self, state: &mut TxnState) {
        let locked = std::mem::take(&mut state.locked);
        self.engine
            .locks
            .release_all(self.id, locked.keys().map(String::as_str));
    }

    fn finish_abort(&self, state: &mut TxnState) {
        if state.status.is_finished() {
            return;
        }
        state.writes.clear();
        self.release(state);
        state.status = TransactionStatus::Aborted;
        self.engine.stats.record_abort();
        debug!(txn = %self.id, "transaction aborted");
    }

    fn next_rev(&self) -> TransactionResult<String> {
        Ok(self.engine.revisions.next()?.to_string())
    }
}

impl TransactionHandle for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    fn options(&self) -> &TransactionOptions {
        &self.options
    }

    fn begin(&self) -> TransactionResult<()> {
        let mut state = self.state.lock();
        if state.status != TransactionStatus::Created {
            return Err(TransactionError::InvalidState {
                expected: TransactionStatus::Created,
                actual: state.status,
            });
        }
        let deadline = self.options.lock_deadline(self.lock_timeout());
        for (name, mode) in self.collections.resolved() {
            let acquired = self
                .engine
                .collection(name)
                .and_then(|_| self.engine.locks.acquire(self.id, name, mode, deadline));
            if let Err(err) = acquired {
                self.finish_abort(&mut state);
                return Err(err);
            }
            state.locked.insert(name.to_string(), mode);
        }
        state.status = TransactionStatus::Running;
        debug!(txn = %self.id, collections = state.locked.len(), "transaction began");
        Ok(())
    }

    fn commit(&self) -> TransactionResult<()> {
        let mut state = self.state.lock();
        Self::ensure_running(&state)?;
        self.publish(&mut state);
        self.release(&mut state);
        state.status = TransactionStatus::Committed;
        self.engine.stats.record_commit();
        if self.options.waits_for_sync() {
            info!(txn = %self.id, "transaction committed with waitForSync");
        } else {
            debug!(txn = %self.id, "transaction committed");
        }
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock();
        self.finish_abort(&mut state);
    }

    fn document(&self, collection: &str, key: &str) -> TransactionResult<Value> {
        let mut state = self.state.lock();
        let target = self.access(&mut state, collection, AccessMode::Read)?;
        Self::visible(&state, &target, key).ok_or_else(|| TransactionError::DocumentNotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        })
    }

    fn insert(&self, collection: &str, document: Value) -> TransactionResult<Value> {
        let mut state = self.state.lock();
        let target = self.access(&mut state, collection, AccessMode::Write)?;
        let mut document = collection::into_object(document)?;
        let key = match document.get(KEY) {
            Some(key) => collection::validate_key(key)?,
            None => self.engine.keys.next()?.to_string(),
        };
        if Self::visible(&state, &target, &key).is_some() {
            return Err(TransactionError::UniqueConstraintViolated { key });
        }
        let rev = self.next_rev()?;
        document.insert(KEY.to_string(), Value::String(key.clone()));
        document.insert(ID.to_string(), Value::String(format!("{collection}/{key}")));
        document.insert(REV.to_string(), Value::String(rev.clone()));
        self.buffer(&mut state, collection, &key, Some(Value::Object(document)))?;
        Ok(collection::metadata(collection, &key, &rev))
    }

    fn update(&self, collection: &str, key: &str, patch: Value) -> TransactionResult<Value> {
        let mut state = self.state.lock();
        let target = self.access(&mut state, collection, AccessMode::Write)?;
        let patch = collection::into_object(patch)?;
        let Some(Value::Object(mut document)) = Self::visible(&state, &target, key) else {
            return Err(TransactionError::DocumentNotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        };
        for (attribute, value) in patch {
            if !matches!(attribute.as_str(), KEY | ID | REV) {
                document.insert(attribute, value);
            }
        }
        let rev = self.next_rev()?;
        document.insert(REV.to_string(), Value::String(rev.clone()));
        self.buffer(&mut state, collection, key, Some(Value::Object(document)))?;
        Ok(collection::metadata(collection, key, &rev))
    }

    fn remove(&self, collection: &str, key: &str) -> TransactionResult<Value> {
        let mut state = self.state.lock();
        let target = self.access(&mut state, collection, AccessMode::Write)?;
        let Some(document) = Self::visible(&state, &target, key) else {
            return Err(TransactionError::DocumentNotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        };
        self.buffer(&mut state, collection, key, None)?;
        Ok(collection::metadata_of(collection, &document))
    }

    fn count(&self, collection: &str) -> TransactionResult<u64> {
        Ok(self.all(collection)?.len() as u64)
    }

    fn all(&self, collection: &str) -> TransactionResult<Vec<Value>> {
        let mut state = self.state.lock();
        let target = self.access(&mut state, collection, AccessMode::Read)?;
        let mut documents = target.snapshot();
        if let Some(writes) = state.writes.get(collection) {
            for (key, document) in writes {
                match document {
                    Some(document) => {
                        documents.insert(key.clone(), document.clone());
                    }
                    None => {
                        documents.remove(key);
                    }
                }
            }
        }
        Ok(documents.into_values().collect())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.status == TransactionStatus::Running {
            warn!(txn = %self.id, "running transaction dropped, aborting");
            state.writes.clear();
            let locked = std::mem::take(&mut state.locked);
            self.engine
                .locks
                .release_all(self.id, locked.keys().map(String::as_str));
            state.status = TransactionStatus::Aborted;
            self.engine.stats.record_abort();
        }
    }
}
