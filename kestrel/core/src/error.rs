use kestrel_common::{DomainError, ErrorCode};
use kestrel_transaction::TransactionError;
use miette::Diagnostic;
use thiserror::Error;

/// A malformed transaction request. Raised before any context or transaction is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error("body is not an object")]
    NotAnObject,

    #[error("{0}")]
    BadParameter(String),
}

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error("unable to get execution context")]
    ContextUnavailable,

    #[error("database not found")]
    DatabaseNotFound,

    /// The action source text did not compile.
    #[error("{0}")]
    Compilation(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// An exception thrown by the action, translated to a domain error.
    #[error(transparent)]
    Script(DomainError),

    /// A failure raised by the storage layer that already aborted the transaction.
    #[error(transparent)]
    Storage(DomainError),

    #[error("out of memory")]
    OutOfMemory,

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) | Self::Compilation(_) => ErrorCode::BAD_PARAMETER,
            Self::ContextUnavailable | Self::Internal(_) => ErrorCode::INTERNAL,
            Self::DatabaseNotFound => ErrorCode::DATABASE_NOT_FOUND,
            Self::Transaction(err) => err.code(),
            Self::Script(err) | Self::Storage(err) => err.code(),
            Self::OutOfMemory => ErrorCode::OUT_OF_MEMORY,
        }
    }

    /// The `(code, message)` pair reported to the caller.
    pub fn to_domain(&self) -> DomainError {
        match self {
            Self::Script(err) | Self::Storage(err) => err.clone(),
            _ => DomainError::new(self.code(), self.to_string()),
        }
    }
}

impl From<kestrel_context::Error> for Error {
    fn from(err: kestrel_context::Error) -> Self {
        match err {
            kestrel_context::Error::ContextUnavailable { .. } => Self::ContextUnavailable,
            kestrel_context::Error::DatabaseNotBound => Self::DatabaseNotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_codes() {
        let err = Error::from(ValidationError::NotAnObject);
        assert_eq!(err.code(), ErrorCode::BAD_PARAMETER);
        assert_eq!(err.to_string(), "body is not an object");

        let err = Error::from(kestrel_context::Error::ContextUnavailable {
            max_contexts: 1,
            waited: Duration::ZERO,
        });
        assert_eq!(err.code(), ErrorCode::INTERNAL);
        assert_eq!(err.to_string(), "unable to get execution context");

        let err = Error::from(kestrel_context::Error::DatabaseNotBound);
        assert_eq!(err.code(), ErrorCode::DATABASE_NOT_FOUND);

        let err = Error::from(TransactionError::Nested);
        assert_eq!(err.code(), ErrorCode::TRANSACTION_NESTED);
    }

    #[test]
    fn test_script_errors_keep_their_code() {
        let err = Error::Script(DomainError::new(ErrorCode::new(1234), "boom"));
        let domain = err.to_domain();
        assert_eq!(domain.code().raw(), 1234);
        assert_eq!(domain.message(), "boom");
    }
}
