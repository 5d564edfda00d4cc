//! Script transactions for kestrel.
//!
//! A request names the collections a transaction uses, its options and an action: a function
//! value or the source text of one. [`Database::execute`] decodes the request, enters an
//! execution context, resolves the action, and runs it inside a transaction that is committed
//! when the action returns and aborted when it fails.

pub mod bindings;
pub mod classifier;
mod database;
pub mod decoder;
mod error;
pub mod orchestrator;
pub mod request;
pub mod resolver;
pub mod translator;

pub use database::{Database, DatabaseConfig};
pub use error::{Error, Result, ValidationError};
pub use kestrel_common::{DomainError, ErrorCode, ResultDocument};
pub use orchestrator::{Execution, Orchestrator, TransactionOutcome};
pub use request::{Action, TransactionRequest};
