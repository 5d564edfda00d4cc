use std::sync::Arc;
use std::time::Duration;

use kestrel_common::constants::{DEFAULT_DATABASE_NAME, DEFAULT_LOCK_TIMEOUT, DEFAULT_PORT_TYPE};
use kestrel_context::{ContextPool, DatabaseContext, PoolConfig, RequestInfo};
use kestrel_script::{IsolateConfig, ScriptValue, from_json};
use kestrel_transaction::{EngineConfig, MemoryEngine, TransactionEngine};
use serde_json::Value;
use tracing::{debug, info};

use crate::bindings;
use crate::decoder::decode;
use crate::error::{Error, Result};
use crate::orchestrator::{Orchestrator, TransactionOutcome};
use crate::resolver::resolve;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub name: String,
    /// Upper bound for execution contexts running transactions at the same time.
    pub max_contexts: usize,
    pub context_acquire_timeout: Duration,
    /// Seconds to wait for collection locks when a request does not set `lockTimeout`.
    /// Only used by the in-memory engine.
    pub default_lock_timeout: f64,
    pub isolate: IsolateConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE_NAME.to_string(),
            max_contexts: 4,
            context_acquire_timeout: Duration::from_secs(60),
            default_lock_timeout: DEFAULT_LOCK_TIMEOUT,
            isolate: IsolateConfig::default(),
        }
    }
}

/// A database running script transactions.
pub struct Database {
    pool: ContextPool,
    memory: Option<MemoryEngine>,
}

impl Database {
    pub fn open_in_memory(config: &DatabaseConfig) -> Result<Self> {
        let engine = MemoryEngine::new(EngineConfig {
            default_lock_timeout: config.default_lock_timeout,
            ..EngineConfig::default()
        });
        let mut database = Self::with_engine(config, Arc::new(engine.clone()));
        database.memory = Some(engine);
        Ok(database)
    }

    /// Opens a database whose transactions are constructed by `engine`.
    pub fn with_engine(config: &DatabaseConfig, engine: Arc<dyn TransactionEngine>) -> Self {
        let context = Arc::new(DatabaseContext::new(config.name.clone(), engine));
        let pool_config = PoolConfig {
            max_contexts: config.max_contexts,
            acquire_timeout: config.context_acquire_timeout,
            isolate: config.isolate.clone(),
        };
        let pool = ContextPool::new(pool_config, context).with_initializer(bindings::install);
        info!(database = %config.name, "database opened");
        Self { pool, memory: None }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.pool.database().name()
    }

    #[inline]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// The in-memory engine, if the database was opened with [`Database::open_in_memory`].
    #[inline]
    pub fn memory_engine(&self) -> Option<&MemoryEngine> {
        self.memory.as_ref()
    }

    pub fn create_collection(&self, name: &str) -> Result<()> {
        let engine = self.memory.as_ref().ok_or_else(|| {
            Error::Internal("collections can only be created in an in-memory database".into())
        })?;
        Ok(engine.create_collection(name)?)
    }

    /// Runs the transaction described by the JSON document `request`.
    pub fn execute_transaction(&self, request: &Value) -> TransactionOutcome {
        self.execute(&from_json(request), DEFAULT_PORT_TYPE)
    }

    /// Runs the transaction described by `request` on behalf of a caller connected through
    /// `port_type`.
    ///
    /// The request is decoded before an execution context is acquired, so malformed requests
    /// neither wait for a context nor construct a transaction.
    pub fn execute(&self, request: &ScriptValue, port_type: &str) -> TransactionOutcome {
        let request = decode(request)?;
        let mut context = self.pool.acquire()?;
        let database = context.database().ok_or(Error::DatabaseNotFound)?;
        let _request = context.enter_request(RequestInfo::new(port_type, database.name()));
        let action = resolve(&request.action, context.isolate_mut())?;
        let state = context.state().clone();
        let execution = Orchestrator::new(database.engine().as_ref(), &state).execute(
            context.isolate_mut(),
            &request,
            &action,
        );
        if let Err(err) = &execution.outcome {
            debug!(
                context = context.id(),
                code = %err.code(),
                error = %err,
                "transaction failed"
            );
        }
        execution.outcome
    }
}
