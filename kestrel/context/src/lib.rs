//! Execution contexts scripts run in, and the pool that hands them out.

pub mod database;
pub mod error;
pub mod execution;
pub mod pool;
pub mod request;

pub use database::DatabaseContext;
pub use error::{ContextResult, Error};
pub use execution::{ContextState, ExecutionContext, SharedState, TransactionScope};
pub use pool::{ContextGuard, ContextPool, PoolConfig};
pub use request::{RequestInfo, RequestScope};
