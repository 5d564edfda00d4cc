//! Transaction trait and related functionality
//!
//! This module defines the contract between the orchestration layer and a transaction engine.

use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collections::CollectionSet;
use crate::error::TransactionResult;
use crate::id::TransactionId;
use crate::options::TransactionOptions;

pub type TransactionRef = Arc<dyn TransactionHandle>;

/// Lifecycle of a transaction: `Created -> Running -> {Committed | Aborted}`.
///
/// A transaction that fails to begin goes straight to `Aborted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Created,
    Running,
    Committed,
    Aborted,
}

impl TransactionStatus {
    /// Returns `true` once the transaction is committed or aborted.
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Committed => f.write_str("committed"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Trait defining the operations every transaction supports.
///
/// Handles are shared (`Arc`) so that script bindings can reach the transaction that is
/// currently running in an execution context, but only the owner drives the lifecycle.
pub trait TransactionHandle: Debug + Send + Sync {
    /// Get the transaction ID
    fn id(&self) -> TransactionId;

    fn status(&self) -> TransactionStatus;

    /// The collections declared when the transaction was constructed.
    fn collections(&self) -> &CollectionSet;

    fn options(&self) -> &TransactionOptions;

    /// Acquires the declared collections and moves the transaction to `Running`.
    fn begin(&self) -> TransactionResult<()>;

    /// Publishes all writes and releases the transaction's resources.
    fn commit(&self) -> TransactionResult<()>;

    /// Discards buffered writes and releases the transaction's resources.
    ///
    /// Aborting a committed or already aborted transaction is a no-op, so this never fails.
    fn abort(&self);

    /// Looks up a document by key.
    fn document(&self, collection: &str, key: &str) -> TransactionResult<Value>;

    /// Inserts a document and returns its metadata (`_id`, `_key`, `_rev`).
    fn insert(&self, collection: &str, document: Value) -> TransactionResult<Value>;

    /// Merges `patch` into an existing document and returns the new metadata.
    fn update(&self, collection: &str, key: &str, patch: Value) -> TransactionResult<Value>;

    /// Removes a document and returns the metadata it had.
    fn remove(&self, collection: &str, key: &str) -> TransactionResult<Value>;

    /// Number of documents visible to the transaction.
    fn count(&self, collection: &str) -> TransactionResult<u64>;

    /// All documents visible to the transaction, ordered by key.
    fn all(&self, collection: &str) -> TransactionResult<Vec<Value>>;
}

/// Constructs transactions over a set of collections.
pub trait TransactionEngine: Send + Sync {
    fn construct(
        &self,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> TransactionResult<TransactionRef>;
}

impl<E: TransactionEngine + ?Sized> TransactionEngine for Arc<E> {
    fn construct(
        &self,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> TransactionResult<TransactionRef> {
        (**self).construct(collections, options)
    }
}
