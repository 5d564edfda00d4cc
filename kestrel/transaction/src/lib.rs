//! Transaction engine contract for kestrel.
//!
//! The orchestration layer only talks to a transaction through [`TransactionHandle`] and obtains
//! handles from a [`TransactionEngine`]. [`memory::MemoryEngine`] is a lock-based in-memory
//! implementation of that contract, and [`NestedTransaction`] lets a transaction run inside an
//! ambient one.

pub mod collections;
pub mod error;
pub mod id;
pub mod memory;
pub mod nested;
pub mod options;
pub mod transaction;

pub use collections::{AccessMode, CollectionSet};
pub use error::{IdError, TransactionError, TransactionResult};
pub use id::{IdGenerator, TransactionId};
pub use memory::{EngineConfig, MemoryEngine, MemoryTransaction};
pub use nested::NestedTransaction;
pub use options::TransactionOptions;
pub use transaction::{TransactionEngine, TransactionHandle, TransactionRef, TransactionStatus};
