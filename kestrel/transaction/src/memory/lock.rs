use std::collections::HashMap;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::collections::AccessMode;
use crate::error::{TransactionError, TransactionResult};
use crate::id::TransactionId;

/// Holders of a single collection lock, keyed by transaction.
#[derive(Debug, Default)]
struct LockState {
    holders: HashMap<TransactionId, AccessMode>,
}

impl LockState {
    /// Readers share with everyone except an exclusive holder; writers additionally exclude each
    /// other.
    fn grantable(&self, txn: TransactionId, mode: AccessMode) -> bool {
        self.holders
            .iter()
            .filter(|(holder, _)| **holder != txn)
            .all(|(_, held)| match (mode, *held) {
                (AccessMode::Exclusive, _) | (_, AccessMode::Exclusive) => false,
                (AccessMode::Write, AccessMode::Write) => false,
                _ => true,
            })
    }
}

/// Collection-level lock table shared by all transactions of an engine.
#[derive(Debug, Default)]
pub(crate) struct LockManager {
    table: Mutex<HashMap<String, LockState>>,
    released: Condvar,
}

impl LockManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until `txn` holds `collection` in at least `mode`, or until `deadline` passes.
    ///
    /// Re-acquiring a lock the transaction already holds upgrades it in place.
    pub(crate) fn acquire(
        &self,
        txn: TransactionId,
        collection: &str,
        mode: AccessMode,
        deadline: Option<Instant>,
    ) -> TransactionResult<()> {
        let mut table = self.table.lock();
        loop {
            let state = table.entry(collection.to_string()).or_default();
            if state.grantable(txn, mode) {
                let held = state.holders.entry(txn).or_insert(mode);
                *held = (*held).max(mode);
                debug!(%txn, collection, %mode, "collection lock acquired");
                return Ok(());
            }
            match deadline {
                None => self.released.wait(&mut table),
                Some(deadline) => {
                    if self.released.wait_until(&mut table, deadline).timed_out() {
                        let state = table.entry(collection.to_string()).or_default();
                        if state.grantable(txn, mode) {
                            continue;
                        }
                        warn!(%txn, collection, %mode, "timed out waiting for collection lock");
                        return Err(TransactionError::LockTimeout {
                            collection: collection.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Releases every lock `txn` holds on `collections` and wakes up waiters.
    pub(crate) fn release_all<'a>(
        &self,
        txn: TransactionId,
        collections: impl IntoIterator<Item = &'a str>,
    ) {
        let mut table = self.table.lock();
        for collection in collections {
            if let Some(state) = table.get_mut(collection) {
                state.holders.remove(&txn);
                if state.holders.is_empty() {
                    table.remove(collection);
                }
            }
        }
        drop(table);
        self.released.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn holders(&self, collection: &str) -> usize {
        self.table
            .lock()
            .get(collection)
            .map_or(0, |state| state.holders.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn txn(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    fn soon() -> Option<Instant> {
        Some(Instant::now() + Duration::from_millis(50))
    }

    #[test]
    fn test_shared_modes() {
        let locks = LockManager::new();
        locks.acquire(txn(1), "c", AccessMode::Read, soon()).unwrap();
        locks.acquire(txn(2), "c", AccessMode::Write, soon()).unwrap();
        locks.acquire(txn(3), "c", AccessMode::Read, soon()).unwrap();
        assert_eq!(locks.holders("c"), 3);
        let err = locks
            .acquire(txn(4), "c", AccessMode::Write, soon())
            .unwrap_err();
        assert_eq!(err, TransactionError::LockTimeout {
            collection: "c".into()
        });
    }

    #[test]
    fn test_exclusive_conflicts_with_everything() {
        let locks = LockManager::new();
        locks.acquire(txn(1), "c", AccessMode::Exclusive, soon()).unwrap();
        assert!(locks.acquire(txn(2), "c", AccessMode::Read, soon()).is_err());
        // Own locks never conflict.
        locks.acquire(txn(1), "c", AccessMode::Write, soon()).unwrap();
        locks.release_all(txn(1), ["c"]);
        assert_eq!(locks.holders("c"), 0);
        locks.acquire(txn(2), "c", AccessMode::Read, soon()).unwrap();
    }

    #[test]
    fn test_waiter_is_woken_on_release() {
        let locks = Arc::new(LockManager::new());
        locks.acquire(txn(1), "c", AccessMode::Exclusive, None).unwrap();
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let deadline = Instant::now() + Duration::from_secs(10);
                locks.acquire(txn(2), "c", AccessMode::Exclusive, Some(deadline))
            })
        };
        thread::sleep(Duration::from_millis(20));
        locks.release_all(txn(1), ["c"]);
        waiter.join().unwrap().unwrap();
        assert_eq!(locks.holders("c"), 1);
    }
}
