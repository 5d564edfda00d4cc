use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kestrel_transaction::{
    AccessMode, CollectionSet, MemoryEngine, NestedTransaction, TransactionEngine,
    TransactionError, TransactionHandle, TransactionOptions, TransactionStatus,
};
use serde_json::json;

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn engine_with(collections: &[&str]) -> MemoryEngine {
    let engine = MemoryEngine::default();
    for name in collections {
        engine.create_collection(name).unwrap();
    }
    engine
}

fn write_set(collections: &[&str]) -> CollectionSet {
    CollectionSet::new(vec![], names(collections), vec![])
}

#[test]
fn test_commit_publishes_writes() {
    let engine = engine_with(&["users"]);
    let txn = engine
        .construct(write_set(&["users"]), TransactionOptions::default())
        .unwrap();
    txn.begin().unwrap();
    let meta = txn.insert("users", json!({"_key": "alice", "age": 3})).unwrap();
    assert_eq!(meta["_id"], "users/alice");

    // Buffered writes are visible to the transaction but not to others.
    assert_eq!(txn.count("users").unwrap(), 1);
    assert_eq!(engine.committed_count("users").unwrap(), 0);

    txn.commit().unwrap();
    assert_eq!(txn.status(), TransactionStatus::Committed);
    assert_eq!(engine.committed_count("users").unwrap(), 1);
    let stored = engine.committed_document("users", "alice").unwrap().unwrap();
    assert_eq!(stored["age"], 3);
    assert_eq!(engine.committed_transactions(), 1);
}

#[test]
fn test_abort_discards_writes_and_is_idempotent() {
    let engine = engine_with(&["users"]);
    let txn = engine
        .construct(write_set(&["users"]), TransactionOptions::default())
        .unwrap();
    txn.begin().unwrap();
    txn.insert("users", json!({"name": "bob"})).unwrap();
    txn.abort();
    txn.abort();
    assert_eq!(txn.status(), TransactionStatus::Aborted);
    assert_eq!(engine.committed_count("users").unwrap(), 0);
    assert_eq!(engine.aborted_transactions(), 1);
    assert_eq!(txn.commit(), Err(TransactionError::Aborted));
}

#[test]
fn test_abort_after_commit_is_noop() {
    let engine = engine_with(&["users"]);
    let txn = engine
        .construct(write_set(&["users"]), TransactionOptions::default())
        .unwrap();
    txn.begin().unwrap();
    txn.insert("users", json!({"_key": "a"})).unwrap();
    txn.commit().unwrap();
    txn.abort();
    assert_eq!(txn.status(), TransactionStatus::Committed);
    assert_eq!(engine.committed_count("users").unwrap(), 1);
}

#[test]
fn test_begin_unknown_collection() {
    let engine = engine_with(&[]);
    let txn = engine
        .construct(write_set(&["missing"]), TransactionOptions::default())
        .unwrap();
    let err = txn.begin().unwrap_err();
    assert_eq!(err, TransactionError::CollectionNotFound("missing".into()));
    assert_eq!(txn.status(), TransactionStatus::Aborted);
}

#[test]
fn test_write_requires_declaration() {
    let engine = engine_with(&["a", "b"]);
    let txn = engine
        .construct(
            CollectionSet::new(names(&["a"]), vec![], vec![]),
            TransactionOptions::default(),
        )
        .unwrap();
    txn.begin().unwrap();
    let err = txn.insert("a", json!({})).unwrap_err();
    assert_eq!(err, TransactionError::UnregisteredCollection {
        collection: "a".into(),
        mode: AccessMode::Write,
    });
    // Undeclared reads are allowed by default.
    assert_eq!(txn.count("b").unwrap(), 0);
    txn.abort();
}

#[test]
fn test_implicit_reads_can_be_disallowed() {
    let engine = engine_with(&["a", "b"]);
    let options = TransactionOptions {
        allow_implicit_collections: Some(false),
        ..Default::default()
    };
    let txn = engine.construct(write_set(&["a"]), options).unwrap();
    txn.begin().unwrap();
    let err = txn.document("b", "x").unwrap_err();
    assert!(matches!(err, TransactionError::UnregisteredCollection { .. }));
    txn.abort();
}

#[test]
fn test_document_operations() {
    let engine = engine_with(&["c"]);
    let txn = engine
        .construct(write_set(&["c"]), TransactionOptions::default())
        .unwrap();
    txn.begin().unwrap();

    let meta = txn.insert("c", json!({"_key": "k", "v": 1})).unwrap();
    let err = txn.insert("c", json!({"_key": "k"})).unwrap_err();
    assert_eq!(err, TransactionError::UniqueConstraintViolated { key: "k".into() });

    let updated = txn.update("c", "k", json!({"v": 2, "_key": "ignored"})).unwrap();
    assert_ne!(updated["_rev"], meta["_rev"]);
    let document = txn.document("c", "k").unwrap();
    assert_eq!(document["v"], 2);
    assert_eq!(document["_key"], "k");

    assert_eq!(
        txn.insert("c", json!([1, 2])).unwrap_err(),
        TransactionError::DocumentTypeInvalid
    );
    assert!(matches!(
        txn.insert("c", json!({"_key": "a b"})).unwrap_err(),
        TransactionError::DocumentKeyBad(_)
    ));

    let removed = txn.remove("c", "k").unwrap();
    assert_eq!(removed["_key"], "k");
    assert!(matches!(
        txn.document("c", "k").unwrap_err(),
        TransactionError::DocumentNotFound { .. }
    ));
    txn.commit().unwrap();
    assert_eq!(engine.committed_count("c").unwrap(), 0);
}

#[test]
fn test_size_limit_aborts() {
    let engine = engine_with(&["c"]);
    let options = TransactionOptions {
        max_transaction_size: Some(64),
        ..Default::default()
    };
    let txn = engine.construct(write_set(&["c"]), options).unwrap();
    txn.begin().unwrap();
    let err = txn
        .insert("c", json!({"payload": "x".repeat(100)}))
        .unwrap_err();
    assert_eq!(err, TransactionError::SizeLimit { limit: 64 });
    assert!(err.aborts_transaction());
    assert_eq!(txn.status(), TransactionStatus::Aborted);
}

#[test]
fn test_intermediate_commit_count() {
    let engine = engine_with(&["c"]);
    let options = TransactionOptions {
        intermediate_commit_count: Some(2),
        ..Default::default()
    };
    let txn = engine.construct(write_set(&["c"]), options).unwrap();
    txn.begin().unwrap();
    txn.insert("c", json!({"_key": "1"})).unwrap();
    assert_eq!(engine.committed_count("c").unwrap(), 0);
    txn.insert("c", json!({"_key": "2"})).unwrap();
    assert_eq!(engine.committed_count("c").unwrap(), 2);
    txn.insert("c", json!({"_key": "3"})).unwrap();
    // Published writes survive an abort, pending ones do not.
    txn.abort();
    assert_eq!(engine.committed_count("c").unwrap(), 2);
}

#[test]
fn test_lock_timeout() {
    let engine = engine_with(&["c"]);
    let holder = engine
        .construct(
            CollectionSet::new(vec![], vec![], names(&["c"])),
            TransactionOptions::default(),
        )
        .unwrap();
    holder.begin().unwrap();

    let options = TransactionOptions {
        lock_timeout: Some(0.05),
        ..Default::default()
    };
    let waiter = engine.construct(write_set(&["c"]), options).unwrap();
    let started = Instant::now();
    let err = waiter.begin().unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(err, TransactionError::LockTimeout {
        collection: "c".into()
    });
    holder.abort();
}

#[test]
fn test_waiting_writer_proceeds_after_commit() {
    let engine = engine_with(&["c"]);
    let first = engine
        .construct(write_set(&["c"]), TransactionOptions::default())
        .unwrap();
    first.begin().unwrap();

    let second = {
        let engine = engine.clone();
        thread::spawn(move || {
            let txn = engine
                .construct(write_set(&["c"]), TransactionOptions::default())
                .unwrap();
            txn.begin().unwrap();
            let count = txn.count("c").unwrap();
            txn.commit().unwrap();
            count
        })
    };
    thread::sleep(Duration::from_millis(20));
    first.insert("c", json!({"_key": "x"})).unwrap();
    first.commit().unwrap();
    assert_eq!(second.join().unwrap(), 1);
}

#[test]
fn test_dropping_running_transaction_aborts() {
    let engine = engine_with(&["c"]);
    {
        let txn = engine
            .construct(
                CollectionSet::new(vec![], vec![], names(&["c"])),
                TransactionOptions::default(),
            )
            .unwrap();
        txn.begin().unwrap();
        txn.insert("c", json!({})).unwrap();
    }
    assert_eq!(engine.aborted_transactions(), 1);
    assert_eq!(engine.committed_count("c").unwrap(), 0);
    // The exclusive lock was released.
    let txn = engine
        .construct(
            CollectionSet::new(vec![], vec![], names(&["c"])),
            TransactionOptions {
                lock_timeout: Some(0.05),
                ..Default::default()
            },
        )
        .unwrap();
    txn.begin().unwrap();
    txn.abort();
}

#[test]
fn test_nested_transaction() {
    let engine = engine_with(&["a", "b"]);
    let parent = engine
        .construct(write_set(&["a"]), TransactionOptions::default())
        .unwrap();
    parent.begin().unwrap();

    let refused = NestedTransaction::new(
        parent.clone(),
        false,
        write_set(&["a"]),
        TransactionOptions::default(),
    );
    assert_eq!(refused.begin(), Err(TransactionError::Nested));

    let unregistered = NestedTransaction::new(
        parent.clone(),
        true,
        write_set(&["b"]),
        TransactionOptions::default(),
    );
    assert!(matches!(
        unregistered.begin(),
        Err(TransactionError::UnregisteredCollection { .. })
    ));

    let nested = NestedTransaction::new(
        Arc::clone(&parent),
        true,
        write_set(&["a"]),
        TransactionOptions::default(),
    );
    nested.begin().unwrap();
    nested.insert("a", json!({"_key": "n"})).unwrap();
    nested.abort();
    // The parent keeps control over the outcome.
    assert_eq!(parent.status(), TransactionStatus::Running);
    parent.commit().unwrap();
    assert_eq!(engine.committed_count("a").unwrap(), 1);
}

#[test]
fn test_collection_management() {
    let engine = engine_with(&["b", "a"]);
    assert_eq!(engine.collection_names(), vec!["a", "b"]);
    assert_eq!(
        engine.create_collection("a"),
        Err(TransactionError::DuplicateCollection("a".into()))
    );
    engine.drop_collection("a").unwrap();
    assert!(!engine.has_collection("a"));
    assert!(engine.drop_collection("a").is_err());
}
