use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Options a transaction is constructed with. Unset values fall back to engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    /// Seconds to wait for collection locks. `0` waits indefinitely.
    pub lock_timeout: Option<f64>,
    pub wait_for_sync: Option<bool>,
    /// Whether collections not declared up front may be read lazily.
    pub allow_implicit_collections: Option<bool>,
    /// Upper bound for the bytes buffered by the transaction.
    pub max_transaction_size: Option<u64>,
    /// Buffered bytes after which buffered writes are published early.
    pub intermediate_commit_size: Option<u64>,
    /// Buffered operations after which buffered writes are published early.
    pub intermediate_commit_count: Option<u64>,
}

impl TransactionOptions {
    #[inline]
    pub fn allows_implicit_collections(&self) -> bool {
        self.allow_implicit_collections.unwrap_or(true)
    }

    #[inline]
    pub fn waits_for_sync(&self) -> bool {
        self.wait_for_sync.unwrap_or(false)
    }

    /// Returns the instant lock acquisition gives up at, or `None` to wait indefinitely.
    pub fn lock_deadline(&self, default_timeout: f64) -> Option<Instant> {
        let timeout = self.lock_timeout.unwrap_or(default_timeout);
        if timeout <= 0.0 {
            return None;
        }
        let timeout = Duration::try_from_secs_f64(timeout).ok()?;
        Instant::now().checked_add(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TransactionOptions::default();
        assert!(options.allows_implicit_collections());
        assert!(!options.waits_for_sync());
    }

    #[test]
    fn test_lock_deadline() {
        let options = TransactionOptions {
            lock_timeout: Some(0.0),
            ..Default::default()
        };
        assert!(options.lock_deadline(10.0).is_none());

        let options = TransactionOptions::default();
        let deadline = options.lock_deadline(10.0).unwrap();
        assert!(deadline > Instant::now());

        let options = TransactionOptions {
            lock_timeout: Some(f64::MAX),
            ..Default::default()
        };
        assert!(options.lock_deadline(10.0).is_none());
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let options: TransactionOptions =
            serde_json::from_str(r#"{"lockTimeout": 1.5, "waitForSync": true}"#).unwrap();
        assert_eq!(options.lock_timeout, Some(1.5));
        assert_eq!(options.wait_for_sync, Some(true));
    }
}
