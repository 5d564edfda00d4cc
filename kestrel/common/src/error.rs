use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error code carried by every failure that reaches a caller.
///
/// Codes raised by scripts are arbitrary integers, so this is an open set: the associated
/// constants name the codes produced by kestrel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(i64);

impl ErrorCode {
    pub const NO_ERROR: Self = Self(0);
    pub const FAILED: Self = Self(1);
    pub const OUT_OF_MEMORY: Self = Self(3);
    pub const INTERNAL: Self = Self(4);
    pub const BAD_PARAMETER: Self = Self(10);
    pub const TYPE_ERROR: Self = Self(17);
    pub const LOCK_TIMEOUT: Self = Self(18);
    pub const REQUEST_CANCELED: Self = Self(21);
    pub const RESOURCE_LIMIT: Self = Self(32);

    pub const CONFLICT: Self = Self(1200);
    pub const DOCUMENT_NOT_FOUND: Self = Self(1202);
    pub const COLLECTION_NOT_FOUND: Self = Self(1203);
    pub const DUPLICATE_NAME: Self = Self(1207);
    pub const UNIQUE_CONSTRAINT_VIOLATED: Self = Self(1210);
    pub const DOCUMENT_KEY_BAD: Self = Self(1221);
    pub const DOCUMENT_TYPE_INVALID: Self = Self(1227);
    pub const DATABASE_NOT_FOUND: Self = Self(1228);

    pub const TRANSACTION_INTERNAL: Self = Self(1650);
    pub const TRANSACTION_NESTED: Self = Self(1651);
    pub const TRANSACTION_UNREGISTERED_COLLECTION: Self = Self(1652);
    pub const TRANSACTION_DISALLOWED_OPERATION: Self = Self(1653);
    pub const TRANSACTION_ABORTED: Self = Self(1654);

    #[inline]
    pub const fn new(code: i64) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Returns the canonical message for a code kestrel knows about.
    pub fn default_message(&self) -> Option<&'static str> {
        let message = match *self {
            Self::NO_ERROR => "no error",
            Self::FAILED => "failed",
            Self::OUT_OF_MEMORY => "out of memory",
            Self::INTERNAL => "internal error",
            Self::BAD_PARAMETER => "bad parameter",
            Self::TYPE_ERROR => "type error",
            Self::LOCK_TIMEOUT => "lock timeout",
            Self::REQUEST_CANCELED => "canceled request",
            Self::RESOURCE_LIMIT => "resource limit exceeded",
            Self::CONFLICT => "conflict",
            Self::DOCUMENT_NOT_FOUND => "document not found",
            Self::COLLECTION_NOT_FOUND => "collection or view not found",
            Self::DUPLICATE_NAME => "duplicate name",
            Self::UNIQUE_CONSTRAINT_VIOLATED => "unique constraint violated",
            Self::DOCUMENT_KEY_BAD => "illegal document key",
            Self::DOCUMENT_TYPE_INVALID => "invalid document type",
            Self::DATABASE_NOT_FOUND => "database not found",
            Self::TRANSACTION_INTERNAL => "internal transaction error",
            Self::TRANSACTION_NESTED => "nested transactions detected",
            Self::TRANSACTION_UNREGISTERED_COLLECTION => "unregistered collection used in transaction",
            Self::TRANSACTION_DISALLOWED_OPERATION => "disallowed operation inside transaction",
            Self::TRANSACTION_ABORTED => "transaction aborted",
            _ => return None,
        };
        Some(message)
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `(code, message)` failure, independent of how the failing layer represents errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic, Serialize, Deserialize)]
#[error("{message}")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
}

impl DomainError {
    #[inline]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error whose message is the canonical message of `code`.
    pub fn from_code(code: ErrorCode) -> Self {
        let message = code.default_message().unwrap_or("unknown error");
        Self::new(code, message)
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL, message)
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_from_code_uses_canonical_message() {
        let err = DomainError::from_code(ErrorCode::OUT_OF_MEMORY);
        assert_eq!(err.code(), ErrorCode::OUT_OF_MEMORY);
        assert_snapshot!(err.to_string(), @"out of memory");
    }

    #[test]
    fn test_unknown_code_has_no_default_message() {
        assert_eq!(ErrorCode::new(1234).default_message(), None);
        let err = DomainError::from_code(ErrorCode::new(1234));
        assert_eq!(err.message(), "unknown error");
    }

    #[test]
    fn test_error_code_serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::BAD_PARAMETER).unwrap();
        assert_eq!(json, "10");
    }
}
