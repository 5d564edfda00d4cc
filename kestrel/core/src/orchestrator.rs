//! Drives one transaction through begin, invoke and commit or abort.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use kestrel_common::ResultDocument;
use kestrel_context::{SharedState, TransactionScope};
use kestrel_script::{CallError, Exception, ScriptRuntime, to_json};
use kestrel_transaction::{
    NestedTransaction, TransactionEngine, TransactionRef, TransactionResult,
};
use tracing::{debug, warn};

use crate::error::Error;
use crate::request::TransactionRequest;
use crate::resolver::Invocable;
use crate::translator::translate;

const UNKNOWN_FAILURE: &str = "caught unknown exception during transaction";

pub type TransactionOutcome = Result<ResultDocument, Error>;

/// What running a transaction produced.
#[derive(Debug)]
pub struct Execution {
    pub outcome: TransactionOutcome,
    /// A non-continuable exception the action raised. The context has been poisoned; callers
    /// running inside script code rethrow it so the enclosing call unwinds as well.
    pub interrupt: Option<Exception>,
}

impl Execution {
    fn finished(outcome: TransactionOutcome) -> Self {
        Self {
            outcome,
            interrupt: None,
        }
    }
}

/// Aborts the transaction on drop unless it was committed.
struct TransactionGuard {
    transaction: TransactionRef,
    finished: bool,
}

impl TransactionGuard {
    fn new(transaction: TransactionRef) -> Self {
        Self {
            transaction,
            finished: false,
        }
    }

    /// A failed commit is not followed by an abort: the engine releases the transaction itself.
    fn commit(mut self) -> TransactionResult<()> {
        self.finished = true;
        self.transaction.commit()?;
        debug!(transaction = %self.transaction.id(), "transaction committed");
        Ok(())
    }

    fn abort(mut self) {
        self.finished = true;
        self.transaction.abort();
        debug!(transaction = %self.transaction.id(), "transaction aborted");
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.transaction.abort();
            debug!(transaction = %self.transaction.id(), "transaction aborted");
        }
    }
}

/// Runs transactions against `engine` on behalf of one execution context.
pub struct Orchestrator<'a> {
    engine: &'a dyn TransactionEngine,
    state: &'a SharedState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: &'a dyn TransactionEngine, state: &'a SharedState) -> Self {
        Self { engine, state }
    }

    /// Runs `action` inside a transaction built from `request`.
    ///
    /// If the context already runs a transaction, the new one is nested into it. Once the
    /// transaction has begun exactly one of commit and abort is called on it.
    pub fn execute<R>(
        &self,
        runtime: &mut R,
        request: &TransactionRequest,
        action: &Invocable,
    ) -> Execution
    where
        R: ScriptRuntime + ?Sized,
    {
        let transaction = match self.construct(request) {
            Ok(transaction) => transaction,
            Err(err) => return Execution::finished(Err(err)),
        };
        if let Err(err) = transaction.begin() {
            debug!(error = %err, "transaction failed to begin");
            return Execution::finished(Err(err.into()));
        }
        debug!(transaction = %transaction.id(), "transaction begun");
        let guard = TransactionGuard::new(transaction.clone());

        let scope = TransactionScope::enter(self.state, transaction);
        let result = catch_unwind(AssertUnwindSafe(|| {
            action.invoke(runtime, &request.params)
        }));
        drop(scope);

        let value = match result {
            Ok(Ok(value)) => value,
            Ok(Err(CallError::Exception(exception))) => {
                guard.abort();
                return self.translated(*exception);
            }
            Ok(Err(CallError::Host(err))) => {
                drop(guard);
                return Execution::finished(Err(Error::Storage(err)));
            }
            Ok(Err(CallError::OutOfMemory)) => {
                guard.abort();
                return Execution::finished(Err(Error::OutOfMemory));
            }
            Err(payload) => {
                guard.abort();
                warn!("transaction action panicked");
                self.state.lock().poison();
                return Execution::finished(Err(Error::Internal(panic_message(payload))));
            }
        };

        let document = match to_json(&value) {
            Ok(document) => ResultDocument::from(document),
            Err(err) => {
                guard.abort();
                return Execution::finished(Err(Error::Internal(err.to_string())));
            }
        };
        Execution::finished(guard.commit().map(|()| document).map_err(Error::from))
    }

    fn construct(&self, request: &TransactionRequest) -> Result<TransactionRef, Error> {
        let ambient = self.state.lock().current_transaction().cloned();
        match ambient {
            Some(parent) => Ok(Arc::new(NestedTransaction::new(
                parent,
                request.embed,
                request.collections.clone(),
                request.options.clone(),
            ))),
            None => Ok(self
                .engine
                .construct(request.collections.clone(), request.options.clone())?),
        }
    }

    fn translated(&self, exception: Exception) -> Execution {
        let translation = translate(&exception);
        let can_continue = translation.can_continue;
        let err = translation.into_error(&exception);
        debug!(code = %err.code(), message = err.message(), "transaction action threw");
        if can_continue {
            return Execution::finished(Err(Error::Script(err)));
        }
        self.state.lock().poison();
        Execution {
            outcome: Err(Error::Script(err)),
            interrupt: Some(exception),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| UNKNOWN_FAILURE.to_string(), |message| message.to_string()),
    }
}
