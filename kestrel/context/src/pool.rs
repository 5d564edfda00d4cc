use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kestrel_script::IsolateConfig;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::database::DatabaseContext;
use crate::error::{ContextResult, Error};
use crate::execution::ExecutionContext;

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Upper bound for the contexts alive at the same time.
    pub max_contexts: usize,
    /// How long [`ContextPool::acquire`] waits for a busy context to be released.
    pub acquire_timeout: Duration,
    pub isolate: IsolateConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_contexts: 4,
            acquire_timeout: Duration::from_secs(60),
            isolate: IsolateConfig::default(),
        }
    }
}

type Initializer = Arc<dyn Fn(&mut ExecutionContext) + Send + Sync>;

#[derive(Default)]
struct PoolState {
    idle: Vec<ExecutionContext>,
    /// Contexts alive, idle or checked out.
    alive: usize,
}

/// A bounded pool of execution contexts entered for one database.
///
/// Contexts are created lazily. A context is checked out by at most one caller at a time and
/// returns to the pool when its [`ContextGuard`] is dropped, unless it was poisoned.
pub struct ContextPool {
    config: PoolConfig,
    database: Arc<DatabaseContext>,
    initializer: Option<Initializer>,
    state: Mutex<PoolState>,
    released: Condvar,
    next_id: AtomicU64,
}

impl ContextPool {
    pub fn new(config: PoolConfig, database: Arc<DatabaseContext>) -> Self {
        Self {
            config,
            database,
            initializer: None,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Runs `initializer` on every context the pool creates, e.g. to install bindings.
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&mut ExecutionContext) + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[inline]
    pub fn database(&self) -> &Arc<DatabaseContext> {
        &self.database
    }

    /// Number of contexts currently alive.
    pub fn alive(&self) -> usize {
        self.state.lock().alive
    }

    /// Number of contexts waiting in the pool.
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Checks out a context, waiting up to the configured timeout for one to be released.
    pub fn acquire(&self) -> ContextResult<ContextGuard<'_>> {
        let start = Instant::now();
        let deadline = start.checked_add(self.config.acquire_timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(context) = state.idle.pop() {
                return Ok(ContextGuard::new(self, context));
            }
            if state.alive < self.config.max_contexts {
                state.alive += 1;
                drop(state);
                return Ok(ContextGuard::new(self, self.create()));
            }
            let timed_out = match deadline {
                Some(deadline) => self.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.released.wait(&mut state);
                    false
                }
            };
            if timed_out && state.idle.is_empty() && state.alive >= self.config.max_contexts {
                warn!(
                    max_contexts = self.config.max_contexts,
                    "no execution context became available"
                );
                return Err(Error::ContextUnavailable {
                    max_contexts: self.config.max_contexts,
                    waited: start.elapsed(),
                });
            }
        }
    }

    fn create(&self) -> ExecutionContext {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut context =
            ExecutionContext::new(id, self.config.isolate.clone(), Some(self.database.clone()));
        if let Some(initializer) = &self.initializer {
            initializer(&mut context);
        }
        context
    }

    fn release(&self, mut context: ExecutionContext) {
        let mut state = self.state.lock();
        if context.is_poisoned() {
            debug!(context = context.id(), "discarding poisoned execution context");
            state.alive -= 1;
        } else {
            context.reset();
            state.idle.push(context);
        }
        drop(state);
        self.released.notify_one();
    }
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("config", &self.config)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// A checked-out execution context, returned to its pool on drop.
pub struct ContextGuard<'a> {
    pool: &'a ContextPool,
    context: Option<ExecutionContext>,
}

impl<'a> ContextGuard<'a> {
    fn new(pool: &'a ContextPool, context: ExecutionContext) -> Self {
        Self {
            pool,
            context: Some(context),
        }
    }
}

impl fmt::Debug for ContextGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("context", &self.context.as_ref().map(ExecutionContext::id))
            .finish_non_exhaustive()
    }
}

impl Deref for ContextGuard<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the context out.
        self.context.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
