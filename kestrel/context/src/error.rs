use std::time::Duration;

use kestrel_common::{DomainError, ErrorCode};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum Error {
    #[error("unable to get execution context")]
    ContextUnavailable {
        max_contexts: usize,
        waited: Duration,
    },

    #[error("execution context is not bound to a database")]
    DatabaseNotBound,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ContextUnavailable { .. } => ErrorCode::INTERNAL,
            Self::DatabaseNotBound => ErrorCode::DATABASE_NOT_FOUND,
        }
    }

    pub fn to_domain(&self) -> DomainError {
        DomainError::new(self.code(), self.to_string())
    }
}

pub type ContextResult<T> = std::result::Result<T, Error>;
