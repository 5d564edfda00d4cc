use std::fmt;
use std::sync::Arc;

use kestrel_transaction::TransactionEngine;

/// A database an execution context can be entered for.
pub struct DatabaseContext {
    name: String,
    engine: Arc<dyn TransactionEngine>,
}

impl DatabaseContext {
    pub fn new(name: impl Into<String>, engine: Arc<dyn TransactionEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn engine(&self) -> &Arc<dyn TransactionEngine> {
        &self.engine
    }
}

impl fmt::Debug for DatabaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
