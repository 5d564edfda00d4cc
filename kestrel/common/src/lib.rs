//! Types shared by every kestrel crate: numeric error codes, the `(code, message)` domain error
//! and the result document returned by a transaction run.

pub mod constants;
pub mod document;
pub mod error;

pub use document::ResultDocument;
pub use error::{DomainError, ErrorCode};
