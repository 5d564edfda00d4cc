//! Id generation for transactions, document revisions and document keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Identifies a transaction for its whole lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TransactionId(u64);

impl TransactionId {
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock-free generator of strictly increasing ids. Reaching `u64::MAX` is an error rather than a
/// wrap-around.
#[derive(Debug)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_start(1)
    }

    pub fn with_start(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Generate the next id
    pub fn next(&self) -> Result<u64, IdError> {
        let mut cur = self.counter.load(Ordering::SeqCst);
        loop {
            if cur == u64::MAX {
                return Err(IdError::Overflow(cur));
            }
            match self.counter.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(cur),
                Err(actual) => cur = actual,
            }
        }
    }

    /// The id the next call to [`IdGenerator::next`] will hand out.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Moves the counter past `id` if it is not already.
    pub fn update_if_greater(&self, id: u64) -> Result<(), IdError> {
        if id == u64::MAX {
            return Err(IdError::Overflow(id));
        }
        self.counter.fetch_max(id + 1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
