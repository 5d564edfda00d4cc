//! Lifecycle properties of transaction runs, observed through a counting engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use insta::assert_snapshot;
use kestrel::{Database, DatabaseConfig, DomainError, ErrorCode, ResultDocument};
use kestrel_script::{CallError, IsolateConfig, ObjectRef, ScriptValue, from_json};
use kestrel_transaction::{
    CollectionSet, TransactionEngine, TransactionError, TransactionHandle, TransactionId,
    TransactionOptions, TransactionRef, TransactionResult, TransactionStatus,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[derive(Debug, Default)]
struct Counters {
    constructed: AtomicUsize,
    begun: AtomicUsize,
    committed: AtomicUsize,
    aborted: AtomicUsize,
    last_options: Mutex<Option<TransactionOptions>>,
}

impl Counters {
    fn snapshot(&self) -> [usize; 4] {
        [
            self.constructed.load(Ordering::SeqCst),
            self.begun.load(Ordering::SeqCst),
            self.committed.load(Ordering::SeqCst),
            self.aborted.load(Ordering::SeqCst),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Failure {
    #[default]
    None,
    Begin,
    Commit,
}

#[derive(Debug)]
struct CountingTransaction {
    counters: Arc<Counters>,
    failure: Failure,
    collections: CollectionSet,
    options: TransactionOptions,
    status: Mutex<TransactionStatus>,
}

impl TransactionHandle for CountingTransaction {
    fn id(&self) -> TransactionId {
        TransactionId::new(1)
    }

    fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    fn options(&self) -> &TransactionOptions {
        &self.options
    }

    fn begin(&self) -> TransactionResult<()> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        if let Failure::Begin = self.failure {
            *self.status.lock() = TransactionStatus::Aborted;
            return Err(TransactionError::LockTimeout {
                collection: "users".into(),
            });
        }
        *self.status.lock() = TransactionStatus::Running;
        Ok(())
    }

    fn commit(&self) -> TransactionResult<()> {
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        if let Failure::Commit = self.failure {
            *self.status.lock() = TransactionStatus::Aborted;
            return Err(TransactionError::Aborted);
        }
        *self.status.lock() = TransactionStatus::Committed;
        Ok(())
    }

    fn abort(&self) {
        self.counters.aborted.fetch_add(1, Ordering::SeqCst);
        *self.status.lock() = TransactionStatus::Aborted;
    }

    fn document(&self, collection: &str, key: &str) -> TransactionResult<Value> {
        Err(TransactionError::DocumentNotFound {
            collection: collection.into(),
            key: key.into(),
        })
    }

    fn insert(&self, _: &str, _: Value) -> TransactionResult<Value> {
        Err(TransactionError::SizeLimit { limit: 0 })
    }

    fn update(&self, _: &str, _: &str, _: Value) -> TransactionResult<Value> {
        Err(TransactionError::DisallowedOperation("update".into()))
    }

    fn remove(&self, _: &str, _: &str) -> TransactionResult<Value> {
        Err(TransactionError::DisallowedOperation("remove".into()))
    }

    fn count(&self, _: &str) -> TransactionResult<u64> {
        Ok(7)
    }

    fn all(&self, _: &str) -> TransactionResult<Vec<Value>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingEngine {
    counters: Arc<Counters>,
    failure: Failure,
}

impl TransactionEngine for CountingEngine {
    fn construct(
        &self,
        collections: CollectionSet,
        options: TransactionOptions,
    ) -> TransactionResult<TransactionRef> {
        self.counters.constructed.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_options.lock() = Some(options.clone());
        Ok(Arc::new(CountingTransaction {
            counters: self.counters.clone(),
            failure: self.failure,
            collections,
            options,
            status: Mutex::new(TransactionStatus::Created),
        }))
    }
}

struct Harness {
    database: Database,
    counters: Arc<Counters>,
}

impl Harness {
    fn new() -> Self {
        Self::with(Failure::None, DatabaseConfig::default())
    }

    fn with(failure: Failure, config: DatabaseConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let engine = CountingEngine {
            counters: counters.clone(),
            failure,
        };
        Self {
            database: Database::with_engine(&config, Arc::new(engine)),
            counters,
        }
    }

    fn run(&self, request: Value) -> kestrel::TransactionOutcome {
        self.database.execute_transaction(&request)
    }

    fn run_source(&self, action: &str) -> kestrel::TransactionOutcome {
        self.run(json!({"collections": {"write": ["users"]}, "action": action}))
    }

    /// Constructed, begun, committed and aborted transactions.
    fn counts(&self) -> [usize; 4] {
        self.counters.snapshot()
    }
}

fn callable_request(action: ScriptValue) -> ScriptValue {
    let request = ObjectRef::ordinary();
    request.set("collections", from_json(&json!({"read": "users"})));
    request.set("action", action);
    request.into()
}

#[test]
fn test_invalid_requests_touch_nothing() {
    let harness = Harness::new();
    let requests = [
        json!(null),
        json!({"collections": {"read": "users"}, "action": "function () {}", "lockTimeout": -1}),
        json!({"collections": {}, "action": "function () {}"}),
        json!({"collections": {"read": [1]}, "action": "function () {}"}),
        json!({"collections": {"read": "users"}}),
    ];
    for request in requests {
        let err = harness.run(request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BAD_PARAMETER);
    }
    assert_eq!(harness.counts(), [0, 0, 0, 0]);
    assert_eq!(harness.database.pool().alive(), 0);
}

#[test]
fn test_compile_error_constructs_no_transaction() {
    let harness = Harness::new();
    let err = harness.run_source("function ( {").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BAD_PARAMETER);
    assert_eq!(harness.counts(), [0, 0, 0, 0]);
}

#[test]
fn test_success_commits_once() {
    let harness = Harness::new();
    let result = harness
        .run(json!({
            "collections": {"read": "users"},
            "action": "function (params) { return {sum: params.a + params.b, list: [1, 'x']}; }",
            "params": {"a": 40, "b": 2},
        }))
        .unwrap();
    assert_eq!(result, ResultDocument::Value(json!({"sum": 42, "list": [1, "x"]})));
    assert_eq!(harness.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_undefined_result_is_none() {
    let harness = Harness::new();
    let result = harness.run_source("function () { var x = 1; }").unwrap();
    assert!(result.is_none());
    assert_eq!(harness.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_thrown_error_num_aborts_once() {
    let harness = Harness::new();
    let err = harness
        .run_source("function (params) { throw {errorNum: 1234, errorMessage: 'boom'}; }")
        .unwrap_err();
    let err = err.to_domain();
    assert_eq!(err.code(), ErrorCode::new(1234));
    assert_eq!(err.message(), "boom");
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_type_error() {
    let harness = Harness::new();
    let err = harness
        .run_source("function () { var missing = null; return missing.field; }")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TYPE_ERROR);
    assert_snapshot!(err.to_string(), @"Cannot read properties of null (reading 'field')");
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_untranslatable_exception_is_internal() {
    let harness = Harness::new();
    let err = harness.run_source("function () { throw 'plain'; }").unwrap_err();
    assert_eq!(err.code(), ErrorCode::INTERNAL);
    assert_snapshot!(err.to_string(), @"Uncaught plain");
}

#[test]
fn test_callable_action() {
    let harness = Harness::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let action = ScriptValue::native("", move |_, _, args| {
        counted.fetch_add(1, Ordering::SeqCst);
        assert!(args[0].is_undefined());
        Ok(42.0.into())
    });
    let result = harness
        .database
        .execute(&callable_request(action), "unix")
        .unwrap();
    assert_eq!(result, ResultDocument::Value(json!(42)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_begin_failure_never_invokes() {
    let harness = Harness::with(Failure::Begin, DatabaseConfig::default());
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = invoked.clone();
    let action = ScriptValue::native("", move |_, _, _| {
        flag.store(true, Ordering::SeqCst);
        Ok(ScriptValue::Undefined)
    });
    let err = harness
        .database
        .execute(&callable_request(action), "tcp/ip")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::LOCK_TIMEOUT);
    assert!(!invoked.load(Ordering::SeqCst));
    assert_eq!(harness.counts(), [1, 1, 0, 0]);
}

#[test]
fn test_commit_failure_is_reported() {
    let harness = Harness::with(Failure::Commit, DatabaseConfig::default());
    let err = harness.run_source("function () { return 1; }").unwrap_err();
    assert_eq!(err.code(), ErrorCode::TRANSACTION_ABORTED);
    assert_eq!(harness.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_host_errors_keep_their_code() {
    let harness = Harness::new();
    let action = ScriptValue::native("", |_, _, _| {
        Err(CallError::Host(DomainError::new(
            ErrorCode::RESOURCE_LIMIT,
            "transaction too large",
        )))
    });
    let err = harness
        .database
        .execute(&callable_request(action), "tcp/ip")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RESOURCE_LIMIT);
    assert_eq!(err.to_string(), "transaction too large");
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_engine_abort_unwinds_through_catch() {
    // The counting engine refuses every insert with a size limit error.
    let harness = Harness::new();
    let err = harness
        .run_source("function () { try { db.users.save({}); } catch (e) { return 'caught'; } }")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RESOURCE_LIMIT);
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_out_of_memory() {
    let config = DatabaseConfig {
        isolate: IsolateConfig {
            max_array_length: 10,
            ..IsolateConfig::default()
        },
        ..DatabaseConfig::default()
    };
    let harness = Harness::with(Failure::None, config);
    let err = harness
        .run_source("function () { var a = []; while (true) a.push(1); }")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OUT_OF_MEMORY);
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_stack_overflow_poisons_context() {
    let harness = Harness::new();
    let err = harness
        .run_source("function () { function f() { return f(); } return f(); }")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::INTERNAL);
    assert_snapshot!(err.to_string(), @"RangeError: Maximum call stack size exceeded");
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
    assert_eq!(harness.database.pool().alive(), 0);

    // A fresh context serves the next request.
    assert!(harness.run_source("function () { return 1; }").is_ok());
    assert_eq!(harness.database.pool().alive(), 1);
}

#[test]
fn test_panicking_action() {
    let harness = Harness::new();
    let action = ScriptValue::native("", |_, _, _| panic!("native action failed"));
    let err = harness
        .database
        .execute(&callable_request(action), "tcp/ip")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::INTERNAL);
    assert_eq!(err.to_string(), "native action failed");
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
    assert_eq!(harness.database.pool().alive(), 0);
}

#[test]
fn test_unencodable_result_aborts() {
    let harness = Harness::new();
    let err = harness
        .run_source("function () { var o = {}; o.self = o; return o; }")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::INTERNAL);
    assert_eq!(harness.counts(), [1, 1, 0, 1]);
}

#[test]
fn test_request_is_visible_during_the_call() {
    let harness = Harness::new();
    let request = from_json(&json!({
        "collections": {"read": "users"},
        "action": "function () { return internal.currentRequest(); }",
    }));
    let result = harness.database.execute(&request, "unix").unwrap();
    assert_eq!(
        result,
        ResultDocument::Value(json!({"portType": "unix", "database": "_system"}))
    );

    let context = harness.database.pool().acquire().unwrap();
    assert!(context.current_request().is_none());
}

#[test]
fn test_options_reach_the_engine() {
    let harness = Harness::new();
    let action = ScriptValue::native("", |_, _, _| Ok(ScriptValue::Undefined));
    let request = callable_request(action);
    let object = request.as_object().unwrap();
    object.set("lockTimeout", 0.0.into());
    object.set("waitForSync", true.into());
    object.set("maxTransactionSize", "2048".into());
    harness.database.execute(&request, "tcp/ip").unwrap();
    let options = harness.counters.last_options.lock().clone().unwrap();
    assert_eq!(options.lock_timeout, Some(0.0));
    assert_eq!(options.wait_for_sync, Some(true));
    assert_eq!(options.max_transaction_size, Some(2048));
    assert_eq!(options.allow_implicit_collections, None);
}
