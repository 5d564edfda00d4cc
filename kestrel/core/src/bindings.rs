//! The `db` object scripts use to reach collections and start nested transactions.

use std::sync::Arc;

use kestrel_common::{DomainError, ErrorCode};
use kestrel_context::{ExecutionContext, SharedState};
use kestrel_script::{
    CallError, ErrorKind, HostObject, Isolate, ObjectRef, ScriptValue, from_json, to_json,
};
use kestrel_transaction::{
    AccessMode, CollectionSet, TransactionEngine, TransactionHandle, TransactionOptions,
    TransactionResult,
};
use serde_json::Value;
use tracing::debug;

use crate::decoder::decode;
use crate::error::Error;
use crate::orchestrator::Orchestrator;
use crate::resolver::resolve;

/// Installs the global `db` object into `context`.
pub fn install(context: &mut ExecutionContext) {
    let state = context.state().clone();
    let db = ScriptValue::host(Arc::new(DatabaseObject {
        state: state.clone(),
    }));
    if let Some(object) = db.as_object() {
        let names = state.clone();
        object.set(
            "_name",
            ScriptValue::native("_name", move |isolate, _, _| {
                let database = names.lock().database().cloned();
                match database {
                    Some(database) => Ok(database.name().into()),
                    None => Err(database_not_found(isolate)),
                }
            }),
        );
        let collections = state.clone();
        object.set(
            "_collection",
            ScriptValue::native("_collection", move |_, _, args| {
                let name = args.first().cloned().unwrap_or_default();
                Ok(collection(&collections, &name.to_display_string()))
            }),
        );
        object.set(
            "_executeTransaction",
            ScriptValue::native("_executeTransaction", move |isolate, _, args| {
                execute_nested(isolate, &state, &args.first().cloned().unwrap_or_default())
            }),
        );
    }
    context.isolate_mut().set_global("db", db);
}

/// Resolves `db.<name>` to the collection called `name`.
struct DatabaseObject {
    state: SharedState,
}

impl HostObject for DatabaseObject {
    fn get(&self, _: &mut Isolate, key: &str) -> Result<Option<ScriptValue>, CallError> {
        if key.starts_with('_') {
            return Ok(None);
        }
        Ok(Some(collection(&self.state, key)))
    }
}

/// Runs `db._executeTransaction(raw)` in the isolate that called it.
fn execute_nested(
    isolate: &mut Isolate,
    state: &SharedState,
    raw: &ScriptValue,
) -> Result<ScriptValue, CallError> {
    let request = decode(raw).map_err(|err| throw(isolate, &Error::from(err).to_domain()))?;
    let database = state.lock().database().cloned();
    let Some(database) = database else {
        return Err(database_not_found(isolate));
    };
    let action =
        resolve(&request.action, isolate).map_err(|err| throw(isolate, &err.to_domain()))?;
    let execution =
        Orchestrator::new(database.engine().as_ref(), state).execute(isolate, &request, &action);
    if let Some(exception) = execution.interrupt {
        return Err(exception.into());
    }
    match execution.outcome {
        Ok(document) => Ok(document.value().map_or(ScriptValue::Undefined, from_json)),
        Err(Error::Storage(err)) => Err(CallError::Host(err)),
        Err(Error::OutOfMemory) => Err(CallError::OutOfMemory),
        Err(err) => Err(throw(isolate, &err.to_domain())),
    }
}

fn collection(state: &SharedState, name: &str) -> ScriptValue {
    let object = ObjectRef::ordinary();
    let collection = Collection {
        state: state.clone(),
        name: name.into(),
    };
    let own_name = collection.name.clone();
    object.set(
        "name",
        ScriptValue::native("name", move |_, _, _| Ok(ScriptValue::string(own_name.clone()))),
    );
    for method in ["save", "insert"] {
        collection.define(&object, method, AccessMode::Write, |isolate, trx, name, args| {
            let document = document_arg(isolate, args)?;
            Ok(trx.insert(name, document).map(|meta| from_json(&meta)))
        });
    }
    collection.define(&object, "document", AccessMode::Read, |_, trx, name, args| {
        Ok(trx.document(name, &key_arg(args)).map(|doc| from_json(&doc)))
    });
    collection.define(&object, "update", AccessMode::Write, |isolate, trx, name, args| {
        let patch = document_arg(isolate, args.get(1..).unwrap_or_default())?;
        Ok(trx.update(name, &key_arg(args), patch).map(|meta| from_json(&meta)))
    });
    collection.define(&object, "remove", AccessMode::Write, |_, trx, name, args| {
        Ok(trx.remove(name, &key_arg(args)).map(|meta| from_json(&meta)))
    });
    collection.define(&object, "count", AccessMode::Read, |_, trx, name, _| {
        Ok(trx.count(name).map(|count| (count as f64).into()))
    });
    collection.define(&object, "toArray", AccessMode::Read, |_, trx, name, _| {
        Ok(trx
            .all(name)
            .map(|documents| ScriptValue::array(documents.iter().map(from_json).collect())))
    });
    object.into()
}

/// Outer error: the script arguments could not be converted. Inner error: the engine refused
/// the operation.
type OperationResult = Result<TransactionResult<ScriptValue>, CallError>;

#[derive(Clone)]
struct Collection {
    state: SharedState,
    name: Arc<str>,
}

impl Collection {
    fn define<F>(&self, object: &ObjectRef, method: &'static str, mode: AccessMode, operation: F)
    where
        F: Fn(&Isolate, &dyn TransactionHandle, &str, &[ScriptValue]) -> OperationResult
            + Send
            + Sync
            + 'static,
    {
        let collection = self.clone();
        object.set(
            method,
            ScriptValue::native(method, move |isolate, _, args| {
                collection.run(isolate, mode, |trx| {
                    operation(isolate, trx, &collection.name, args)
                })
            }),
        );
    }

    /// Runs `operation` in the ambient transaction, or in a single-operation transaction of
    /// its own when the context runs none.
    fn run(
        &self,
        isolate: &Isolate,
        mode: AccessMode,
        operation: impl FnOnce(&dyn TransactionHandle) -> OperationResult,
    ) -> Result<ScriptValue, CallError> {
        let (ambient, database) = {
            let state = self.state.lock();
            (
                state.current_transaction().cloned(),
                state.database().cloned(),
            )
        };
        match (ambient, database) {
            (Some(transaction), _) => operation(transaction.as_ref())?.map_err(|err| {
                if err.aborts_transaction() {
                    CallError::Host(err.to_domain())
                } else {
                    throw(isolate, &err.to_domain())
                }
            }),
            (None, Some(database)) => {
                self.standalone(database.engine().as_ref(), mode, operation)?
                    .map_err(|err| throw(isolate, &err.to_domain()))
            }
            (None, None) => Err(database_not_found(isolate)),
        }
    }

    fn standalone(
        &self,
        engine: &dyn TransactionEngine,
        mode: AccessMode,
        operation: impl FnOnce(&dyn TransactionHandle) -> OperationResult,
    ) -> OperationResult {
        let name = vec![self.name.to_string()];
        let collections = match mode {
            AccessMode::Read => CollectionSet::new(name, Vec::new(), Vec::new()),
            AccessMode::Write => CollectionSet::new(Vec::new(), name, Vec::new()),
            AccessMode::Exclusive => CollectionSet::new(Vec::new(), Vec::new(), name),
        };
        let transaction = match engine.construct(collections, TransactionOptions::default()) {
            Ok(transaction) => transaction,
            Err(err) => return Ok(Err(err)),
        };
        if let Err(err) = transaction.begin() {
            return Ok(Err(err));
        }
        debug!(collection = %self.name, %mode, "running single-operation transaction");
        match operation(transaction.as_ref()) {
            Ok(Ok(value)) => Ok(transaction.commit().map(|()| value)),
            Ok(Err(err)) => {
                transaction.abort();
                Ok(Err(err))
            }
            Err(err) => {
                transaction.abort();
                Err(err)
            }
        }
    }
}

fn document_arg(isolate: &Isolate, args: &[ScriptValue]) -> Result<Value, CallError> {
    let value = args.first().cloned().unwrap_or_default();
    match to_json(&value) {
        Ok(document) => Ok(document.unwrap_or(Value::Null)),
        Err(err) => Err(isolate.throw_error(ErrorKind::TypeError, err.to_string())),
    }
}

/// A key, or a document whose `_key` is used.
fn key_arg(args: &[ScriptValue]) -> String {
    let value = args.first().cloned().unwrap_or_default();
    match value.get("_key") {
        Some(key) => key.to_display_string(),
        None => value.to_display_string(),
    }
}

/// Creates the catchable error object scripts see for a failed database operation.
fn throw(isolate: &Isolate, err: &DomainError) -> CallError {
    let value = isolate.create_error(ErrorKind::Error, err.message());
    if let Some(object) = value.as_object() {
        object.set("name", "ArangoError".into());
        object.set("error", true.into());
        object.set("errorNum", (err.code().raw() as f64).into());
        object.set("errorMessage", err.message().into());
    }
    isolate.throw_value(value)
}

fn database_not_found(isolate: &Isolate) -> CallError {
    throw(isolate, &DomainError::from_code(ErrorCode::DATABASE_NOT_FOUND))
}
