use kestrel_common::{DomainError, ErrorCode};
use thiserror::Error;

use crate::collections::AccessMode;
use crate::transaction::TransactionStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("id overflow, reached {0}")]
    Overflow(u64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("timeout waiting to lock collection '{collection}'")]
    LockTimeout { collection: String },

    #[error("collection or view not found: {0}")]
    CollectionNotFound(String),

    #[error("duplicate name: collection '{0}' already exists")]
    DuplicateCollection(String),

    #[error("collection '{collection}' is not registered with {mode} access in the transaction")]
    UnregisteredCollection {
        collection: String,
        mode: AccessMode,
    },

    #[error("nested transactions detected")]
    Nested,

    #[error("disallowed operation inside transaction: {0}")]
    DisallowedOperation(String),

    #[error("document not found: {collection}/{key}")]
    DocumentNotFound { collection: String, key: String },

    #[error(
        "unique constraint violated - in index primary of type primary over '_key'; conflicting key: {key}"
    )]
    UniqueConstraintViolated { key: String },

    #[error("illegal document key: {0}")]
    DocumentKeyBad(String),

    #[error("invalid document type")]
    DocumentTypeInvalid,

    #[error("aborting transaction because maximal transaction size limit of {limit} bytes is reached")]
    SizeLimit { limit: u64 },

    #[error("transaction is {actual}, expected it to be {expected}")]
    InvalidState {
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    #[error("transaction aborted")]
    Aborted,

    #[error(transparent)]
    Id(#[from] IdError),
}

impl TransactionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::LockTimeout { .. } => ErrorCode::LOCK_TIMEOUT,
            Self::CollectionNotFound(_) => ErrorCode::COLLECTION_NOT_FOUND,
            Self::DuplicateCollection(_) => ErrorCode::DUPLICATE_NAME,
            Self::UnregisteredCollection { .. } => ErrorCode::TRANSACTION_UNREGISTERED_COLLECTION,
            Self::Nested => ErrorCode::TRANSACTION_NESTED,
            Self::DisallowedOperation(_) => ErrorCode::TRANSACTION_DISALLOWED_OPERATION,
            Self::DocumentNotFound { .. } => ErrorCode::DOCUMENT_NOT_FOUND,
            Self::UniqueConstraintViolated { .. } => ErrorCode::UNIQUE_CONSTRAINT_VIOLATED,
            Self::DocumentKeyBad(_) => ErrorCode::DOCUMENT_KEY_BAD,
            Self::DocumentTypeInvalid => ErrorCode::DOCUMENT_TYPE_INVALID,
            Self::SizeLimit { .. } => ErrorCode::RESOURCE_LIMIT,
            Self::InvalidState { .. } | Self::Id(_) => ErrorCode::TRANSACTION_INTERNAL,
            Self::Aborted => ErrorCode::TRANSACTION_ABORTED,
        }
    }

    /// Returns `true` if the engine aborted the transaction itself while reporting this error.
    pub fn aborts_transaction(&self) -> bool {
        matches!(self, Self::SizeLimit { .. })
    }

    pub fn to_domain(&self) -> DomainError {
        DomainError::new(self.code(), self.to_string())
    }
}

pub type TransactionResult<T> = Result<T, TransactionError>;
