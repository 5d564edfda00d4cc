use std::sync::Arc;

use kestrel_script::{Isolate, IsolateConfig, ObjectRef, ScriptValue};
use kestrel_transaction::TransactionRef;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::database::DatabaseContext;
use crate::request::{RequestInfo, RequestScope};

pub type SharedState = Arc<Mutex<ContextState>>;

/// State of an execution context that script bindings read while a call is running.
///
/// It is shared with the native functions installed in the context's isolate, which is how
/// script code observes the request and the transaction it runs in.
#[derive(Debug, Default)]
pub struct ContextState {
    pub(crate) database: Option<Arc<DatabaseContext>>,
    pub(crate) request: Option<RequestInfo>,
    pub(crate) transactions: Vec<TransactionRef>,
    poisoned: bool,
}

impl ContextState {
    #[inline]
    pub fn database(&self) -> Option<&Arc<DatabaseContext>> {
        self.database.as_ref()
    }

    #[inline]
    pub fn request(&self) -> Option<&RequestInfo> {
        self.request.as_ref()
    }

    /// The innermost transaction running in the context.
    #[inline]
    pub fn current_transaction(&self) -> Option<&TransactionRef> {
        self.transactions.last()
    }

    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Marks the context as unsafe to reuse. The pool discards it on release.
    ///
    /// Script bindings running a nested transaction poison the context through here.
    pub fn poison(&mut self) {
        if !self.poisoned {
            warn!("execution context cannot continue");
            self.poisoned = true;
        }
    }
}

/// An isolate together with the state of the call that is using it.
pub struct ExecutionContext {
    id: u64,
    isolate: Isolate,
    state: SharedState,
}

impl ExecutionContext {
    pub fn new(id: u64, config: IsolateConfig, database: Option<Arc<DatabaseContext>>) -> Self {
        let state = Arc::new(Mutex::new(ContextState {
            database,
            ..Default::default()
        }));
        let mut isolate = Isolate::new(config);
        install_internal(&mut isolate, &state);
        debug!(context = id, "execution context created");
        Self {
            id,
            isolate,
            state,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn isolate(&self) -> &Isolate {
        &self.isolate
    }

    #[inline]
    pub fn isolate_mut(&mut self) -> &mut Isolate {
        &mut self.isolate
    }

    #[inline]
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn database(&self) -> Option<Arc<DatabaseContext>> {
        self.state.lock().database.clone()
    }

    pub fn current_request(&self) -> Option<RequestInfo> {
        self.state.lock().request.clone()
    }

    pub fn current_transaction(&self) -> Option<TransactionRef> {
        self.state.lock().current_transaction().cloned()
    }

    /// Publishes `request` to scripts until the returned scope is dropped.
    pub fn enter_request(&self, request: RequestInfo) -> RequestScope {
        RequestScope::enter(&self.state, request)
    }

    /// Makes `transaction` the ambient transaction until the returned scope is dropped.
    pub fn enter_transaction(&self, transaction: TransactionRef) -> TransactionScope {
        TransactionScope::enter(&self.state, transaction)
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock().is_poisoned()
    }

    pub fn poison(&self) {
        self.state.lock().poison();
    }

    /// Clears leftovers of the previous call.
    pub(crate) fn reset(&mut self) {
        let mut state = self.state.lock();
        state.request = None;
        state.transactions.clear();
    }
}

/// Keeps a transaction on the ambient transaction stack of a context until dropped.
#[must_use = "the transaction leaves the context as soon as the scope is dropped"]
pub struct TransactionScope {
    state: SharedState,
    depth: usize,
}

impl TransactionScope {
    pub fn enter(state: &SharedState, transaction: TransactionRef) -> Self {
        let mut guard = state.lock();
        guard.transactions.push(transaction);
        let depth = guard.transactions.len();
        drop(guard);
        Self {
            state: state.clone(),
            depth,
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.state.lock().transactions.truncate(self.depth - 1);
    }
}

/// Installs the `internal` object scripts use to inspect their context.
fn install_internal(isolate: &mut Isolate, state: &SharedState) {
    let internal = ObjectRef::ordinary();
    let state = state.clone();
    internal.set(
        "currentRequest",
        ScriptValue::native("currentRequest", move |_, _, _| {
            Ok(state
                .lock()
                .request
                .as_ref()
                .map_or(ScriptValue::Undefined, RequestInfo::to_script_value))
        }),
    );
    isolate.set_global("internal", internal.into());
}

#[cfg(test)]
mod tests {
    use kestrel_transaction::{CollectionSet, MemoryEngine, TransactionEngine, TransactionOptions};

    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext::new(1, IsolateConfig::default(), None)
    }

    fn evaluate(context: &mut ExecutionContext, source: &str) -> ScriptValue {
        context.isolate_mut().evaluate(source, "test").unwrap()
    }

    #[test]
    fn test_request_scope_is_visible_to_scripts() {
        let mut context = context();
        assert!(evaluate(&mut context, "internal.currentRequest()").is_undefined());
        {
            let _scope = context.enter_request(RequestInfo::new("unix", "_system"));
            let port = evaluate(&mut context, "internal.currentRequest().portType");
            assert_eq!(port.as_str(), Some("unix"));
        }
        assert!(evaluate(&mut context, "internal.currentRequest()").is_undefined());
        assert!(context.current_request().is_none());
    }

    #[test]
    fn test_request_scopes_nest() {
        let context = context();
        let outer = context.enter_request(RequestInfo::new("tcp/ip", "a"));
        {
            let _inner = context.enter_request(RequestInfo::new("tcp/ip", "b"));
            assert_eq!(context.current_request().unwrap().database, "b");
        }
        assert_eq!(context.current_request().unwrap().database, "a");
        drop(outer);
        assert!(context.current_request().is_none());
    }

    #[test]
    fn test_transaction_scope() {
        let engine = MemoryEngine::default();
        let trx = engine
            .construct(CollectionSet::default(), TransactionOptions::default())
            .unwrap();
        let context = context();
        assert!(context.current_transaction().is_none());
        {
            let _scope = context.enter_transaction(trx.clone());
            let current = context.current_transaction().unwrap();
            assert_eq!(current.id(), trx.id());
        }
        assert!(context.current_transaction().is_none());
    }

    #[test]
    fn test_poison() {
        let context = context();
        assert!(!context.is_poisoned());
        context.poison();
        context.state().lock().poison();
        assert!(context.is_poisoned());
        // Leftovers of a call are cleared, the poison flag is not.
        let mut context = context;
        context.reset();
        assert!(context.is_poisoned());
    }
}
