use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::collections::{AccessMode, CollectionSet};
use crate::error::{TransactionError, TransactionResult};
use crate::id::TransactionId;
use crate::options::TransactionOptions;
use crate::transaction::{TransactionHandle, TransactionRef, TransactionStatus};

/// A transaction started while another one is already running in the same execution context.
///
/// When embedding is allowed the nested transaction runs inside its parent: beginning it only
/// checks that the parent covers the requested collections, and its commit and abort never
/// touch the parent, which keeps sole control over the outcome. When embedding is not allowed,
/// `begin` fails with [`TransactionError::Nested`].
#[derive(Debug)]
pub struct NestedTransaction {
    parent: TransactionRef,
    embed: bool,
    collections: CollectionSet,
    options: TransactionOptions,
    status: Mutex<TransactionStatus>,
}

impl NestedTransaction {
    pub fn new(
        parent: TransactionRef,
        embed: bool,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> Self {
        Self {
            parent,
            embed,
            collections,
            options,
            status: Mutex::new(TransactionStatus::Created),
        }
    }

    #[inline]
    pub fn parent(&self) -> &TransactionRef {
        &self.parent
    }

    fn ensure_running(&self) -> TransactionResult<()> {
        match *self.status.lock() {
            TransactionStatus::Running => Ok(()),
            TransactionStatus::Aborted => Err(TransactionError::Aborted),
            actual => Err(TransactionError::InvalidState {
                expected: TransactionStatus::Running,
                actual,
            }),
        }
    }

    fn check_registered(&self, name: &str, mode: AccessMode) -> TransactionResult<()> {
        match self.parent.collections().mode_of(name) {
            Some(declared) if declared >= mode => Ok(()),
            _ if mode == AccessMode::Read && self.parent.options().allows_implicit_collections() => {
                Ok(())
            }
            _ => Err(TransactionError::UnregisteredCollection {
                collection: name.to_string(),
                mode,
            }),
        }
    }
}

impl TransactionHandle for NestedTransaction {
    fn id(&self) -> TransactionId {
        self.parent.id()
    }

    fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    fn options(&self) -> &TransactionOptions {
        &self.options
    }

    fn begin(&self) -> TransactionResult<()> {
        let mut status = self.status.lock();
        if *status != TransactionStatus::Created {
            return Err(TransactionError::InvalidState {
                expected: TransactionStatus::Created,
                actual: *status,
            });
        }
        let result = if !self.embed {
            Err(TransactionError::Nested)
        } else if self.parent.status() != TransactionStatus::Running {
            Err(TransactionError::InvalidState {
                expected: TransactionStatus::Running,
                actual: self.parent.status(),
            })
        } else {
            self.collections
                .resolved()
                .into_iter()
                .try_for_each(|(name, mode)| self.check_registered(name, mode))
        };
        match result {
            Ok(()) => {
                debug!(parent = %self.parent.id(), "embedded transaction started");
                *status = TransactionStatus::Running;
                Ok(())
            }
            Err(err) => {
                *status = TransactionStatus::Aborted;
                Err(err)
            }
        }
    }

    fn commit(&self) -> TransactionResult<()> {
        let mut status = self.status.lock();
        match *status {
            TransactionStatus::Running => {
                *status = TransactionStatus::Committed;
                Ok(())
            }
            TransactionStatus::Aborted => Err(TransactionError::Aborted),
            actual => Err(TransactionError::InvalidState {
                expected: TransactionStatus::Running,
                actual,
            }),
        }
    }

    fn abort(&self) {
        let mut status = self.status.lock();
        if !status.is_finished() {
            *status = TransactionStatus::Aborted;
        }
    }

    fn document(&self, collection: &str, key: &str) -> TransactionResult<Value> {
        self.ensure_running()?;
        self.parent.document(collection, key)
    }

    fn insert(&self, collection: &str, document: Value) -> TransactionResult<Value> {
        self.ensure_running()?;
        self.parent.insert(collection, document)
    }

    fn update(&self, collection: &str, key: &str, patch: Value) -> TransactionResult<Value> {
        self.ensure_running()?;
        self.parent.update(collection, key, patch)
    }

    fn remove(&self, collection: &str, key: &str) -> TransactionResult<Value> {
        self.ensure_running()?;
        self.parent.remove(collection, key)
    }

    fn count(&self, collection: &str) -> TransactionResult<u64> {
        self.ensure_running()?;
        self.parent.count(collection)
    }

    fn all(&self, collection: &str) -> TransactionResult<Vec<Value>> {
        self.ensure_running()?;
        self.parent.all(collection)
    }
}
