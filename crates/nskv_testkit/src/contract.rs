//! Backend conformance suite.
//!
//! Every check runs against a started store and panics with a message
//! naming the engine when the store departs from the contract. Backends
//! are run through [`run_contract_suite`], which gives each check a fresh
//! store.

use crate::fixtures::{BackendKind, TestStore};
use nskv_storage::{
    ErrorKind, KvStore, LifecycleContext, LifecycleState, StoreResult, WriteBatch, WriteOp,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// A named conformance check.
pub type ContractCheck = fn(&dyn KvStore);

/// All checks that take a started store, with their names.
pub const CONTRACT_CHECKS: &[(&str, ContractCheck)] = &[
    ("unknown_namespace", check_unknown_namespace),
    ("put_then_get", check_put_then_get),
    ("put_overwrites", check_put_overwrites),
    ("put_if_not_exists_conflict", check_put_if_not_exists_conflict),
    ("delete_is_idempotent", check_delete_is_idempotent),
    ("delete_keeps_namespace", check_delete_keeps_namespace),
    ("delete_does_not_create_namespace", check_delete_does_not_create_namespace),
    ("namespaces_isolate_keys", check_namespaces_isolate_keys),
    ("empty_namespace_rejected", check_empty_namespace_rejected),
    ("empty_key_and_value", check_empty_key_and_value),
    ("batch_applies_in_order", check_batch_applies_in_order),
    ("batch_stops_at_first_failure", check_batch_stops_at_first_failure),
    ("empty_batch_is_noop", check_empty_batch_is_noop),
    ("batch_retry_after_failure", check_batch_retry_after_failure),
    ("concurrent_put_if_not_exists", check_concurrent_put_if_not_exists),
];

/// Runs every check against fresh stores of `kind`, then the lifecycle check.
pub fn run_contract_suite(kind: BackendKind) {
    for (name, check) in CONTRACT_CHECKS {
        let test_store = TestStore::started(kind);
        eprintln!("contract[{kind}]: {name}");
        check(test_store.store.as_ref());
    }

    let test_store = TestStore::unstarted(kind);
    check_lifecycle(test_store.store.as_ref());
}

fn expect_kind<T: std::fmt::Debug>(store: &dyn KvStore, result: StoreResult<T>, kind: ErrorKind) {
    match result {
        Err(err) => assert_eq!(
            err.kind(),
            kind,
            "[{}] expected {:?}, got {}",
            store.engine(),
            kind,
            err
        ),
        Ok(value) => panic!(
            "[{}] expected {:?}, got Ok({:?})",
            store.engine(),
            kind,
            value
        ),
    }
}

/// Reads from a never-written namespace fail with `NamespaceNotFound`.
pub fn check_unknown_namespace(store: &dyn KvStore) {
    expect_kind(
        store,
        store.get("never", b"k"),
        ErrorKind::NamespaceNotFound,
    );
    expect_kind(store, store.get("never", b""), ErrorKind::NamespaceNotFound);
}

/// A put is visible to the next get.
pub fn check_put_then_get(store: &dyn KvStore) {
    store.put("ns", b"k", b"v").unwrap();
    assert_eq!(store.get("ns", b"k").unwrap(), b"v", "[{}]", store.engine());
    expect_kind(store, store.get("ns", b"other"), ErrorKind::NotExist);
}

/// A second put replaces the value.
pub fn check_put_overwrites(store: &dyn KvStore) {
    store.put("ns", b"k", b"v1").unwrap();
    store.put("ns", b"k", b"v2").unwrap();
    assert_eq!(
        store.get("ns", b"k").unwrap(),
        b"v2",
        "[{}]",
        store.engine()
    );
}

/// A conditional put over an existing record fails and keeps the value.
pub fn check_put_if_not_exists_conflict(store: &dyn KvStore) {
    store.put_if_not_exists("ns", b"k", b"v1").unwrap();
    expect_kind(
        store,
        store.put_if_not_exists("ns", b"k", b"v2"),
        ErrorKind::AlreadyExists,
    );
    assert_eq!(
        store.get("ns", b"k").unwrap(),
        b"v1",
        "[{}]",
        store.engine()
    );

    store.put("ns", b"plain", b"x").unwrap();
    expect_kind(
        store,
        store.put_if_not_exists("ns", b"plain", b"y"),
        ErrorKind::AlreadyExists,
    );
}

/// Deleting absent keys succeeds and the key reads as `NotExist`.
pub fn check_delete_is_idempotent(store: &dyn KvStore) {
    store.put("ns", b"present", b"v").unwrap();
    store.delete("ns", b"never-written").unwrap();
    expect_kind(
        store,
        store.get("ns", b"never-written"),
        ErrorKind::NotExist,
    );

    store.delete("ns", b"present").unwrap();
    store.delete("ns", b"present").unwrap();
    expect_kind(store, store.get("ns", b"present"), ErrorKind::NotExist);

    store.put_if_not_exists("ns", b"present", b"again").unwrap();
    assert_eq!(store.get("ns", b"present").unwrap(), b"again");
}

/// Deleting the last record leaves the namespace in place.
pub fn check_delete_keeps_namespace(store: &dyn KvStore) {
    store.put("solo", b"k", b"v").unwrap();
    store.delete("solo", b"k").unwrap();
    expect_kind(store, store.get("solo", b"k"), ErrorKind::NotExist);
}

/// Deleting in an unknown namespace succeeds without creating it.
pub fn check_delete_does_not_create_namespace(store: &dyn KvStore) {
    store.delete("ghost", b"k").unwrap();
    expect_kind(
        store,
        store.get("ghost", b"k"),
        ErrorKind::NamespaceNotFound,
    );
}

/// The same key in two namespaces names two records.
pub fn check_namespaces_isolate_keys(store: &dyn KvStore) {
    store.put("a", b"k", b"1").unwrap();
    store.put("b", b"k", b"2").unwrap();
    store.put("a.b", b"c", b"3").unwrap();

    assert_eq!(store.get("a", b"k").unwrap(), b"1");
    assert_eq!(store.get("b", b"k").unwrap(), b"2");
    expect_kind(store, store.get("a", b"b.c"), ErrorKind::NotExist);

    store.delete("a", b"k").unwrap();
    assert_eq!(store.get("b", b"k").unwrap(), b"2");
}

/// The empty namespace cannot be written and is never found.
pub fn check_empty_namespace_rejected(store: &dyn KvStore) {
    expect_kind(
        store,
        store.put("", b"k", b"v"),
        ErrorKind::InvalidOperation,
    );
    expect_kind(
        store,
        store.put_if_not_exists("", b"k", b"v"),
        ErrorKind::InvalidOperation,
    );
    expect_kind(store, store.get("", b"k"), ErrorKind::NamespaceNotFound);
    store.delete("", b"k").unwrap();
}

/// Empty keys and values are ordinary bytes.
pub fn check_empty_key_and_value(store: &dyn KvStore) {
    store.put("ns", b"", b"").unwrap();
    assert_eq!(store.get("ns", b"").unwrap(), b"");
    expect_kind(
        store,
        store.put_if_not_exists("ns", b"", b"x"),
        ErrorKind::AlreadyExists,
    );
}

/// A successful commit applies entries in order and clears the batch.
pub fn check_batch_applies_in_order(store: &dyn KvStore) {
    let batch = WriteBatch::new();
    batch.put("ns", b"k", b"1");
    batch.put("ns", b"k", b"2");
    batch.delete("ns", b"gone");
    batch.put_if_not_exists("ns", b"fresh", b"f");
    batch.put("other", b"k", b"o");
    batch.delete("ns", b"k");
    batch.put_if_not_exists("ns", b"k", b"3");

    store.commit(&batch).unwrap();
    assert!(batch.is_empty(), "[{}] batch not cleared", store.engine());
    assert_eq!(store.get("ns", b"k").unwrap(), b"3");
    assert_eq!(store.get("ns", b"fresh").unwrap(), b"f");
    assert_eq!(store.get("other", b"k").unwrap(), b"o");
    expect_kind(store, store.get("ns", b"gone"), ErrorKind::NotExist);
}

/// A failing entry stops the commit; earlier entries stay applied and the
/// batch keeps every entry.
pub fn check_batch_stops_at_first_failure(store: &dyn KvStore) {
    store.put("n", b"b", b"old").unwrap();

    let batch = WriteBatch::new();
    batch.put("n", b"a", b"1");
    batch.put_if_not_exists("n", b"b", b"2");
    batch.put("n", b"c", b"3");
    let before = batch.entries();

    expect_kind(store, store.commit(&batch), ErrorKind::AlreadyExists);
    assert_eq!(store.get("n", b"a").unwrap(), b"1", "[{}]", store.engine());
    assert_eq!(store.get("n", b"b").unwrap(), b"old");
    expect_kind(store, store.get("n", b"c"), ErrorKind::NotExist);
    assert_eq!(
        batch.entries(),
        before,
        "[{}] batch modified",
        store.engine()
    );
}

/// Committing an empty batch succeeds and changes nothing.
pub fn check_empty_batch_is_noop(store: &dyn KvStore) {
    let batch = WriteBatch::new();
    store.commit(&batch).unwrap();
    store.commit(&batch).unwrap();
    assert!(batch.is_empty());
    expect_kind(store, store.get("ns", b"k"), ErrorKind::NamespaceNotFound);
}

/// A batch left intact by a failed commit can be fixed and committed.
pub fn check_batch_retry_after_failure(store: &dyn KvStore) {
    store.put("ns", b"taken", b"x").unwrap();

    let batch = WriteBatch::new();
    batch.put("ns", b"a", b"1");
    batch.put_if_not_exists("ns", b"taken", b"y");
    expect_kind(store, store.commit(&batch), ErrorKind::AlreadyExists);

    let retry: WriteBatch = batch
        .entries()
        .into_iter()
        .filter(|op| !matches!(op, WriteOp::PutIfNotExists { key, .. } if key == b"taken"))
        .collect();
    store.commit(&retry).unwrap();
    assert!(retry.is_empty());
    assert_eq!(store.get("ns", b"a").unwrap(), b"1");
    assert_eq!(store.get("ns", b"taken").unwrap(), b"x");
}

/// Of many racing conditional puts on one key, exactly one succeeds.
pub fn check_concurrent_put_if_not_exists(store: &dyn KvStore) {
    const THREADS: usize = 8;

    let barrier = Barrier::new(THREADS);
    let wins = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);

    thread::scope(|scope| {
        for i in 0..THREADS {
            let barrier = &barrier;
            let wins = &wins;
            let conflicts = &conflicts;
            scope.spawn(move || {
                barrier.wait();
                match store.put_if_not_exists("race", b"key", &[i as u8]) {
                    Ok(()) => wins.fetch_add(1, Ordering::SeqCst),
                    Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                        conflicts.fetch_add(1, Ordering::SeqCst)
                    }
                    Err(err) => panic!("[{}] unexpected error: {err}", store.engine()),
                };
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1, "[{}]", store.engine());
    assert_eq!(conflicts.load(Ordering::SeqCst), THREADS - 1);
}

/// Every operation fails with `InvalidOperation` before start and after
/// stop; a stopped store cannot be restarted.
///
/// Takes a store that has not been started.
pub fn check_lifecycle(store: &dyn KvStore) {
    assert_eq!(store.state(), LifecycleState::Created);
    expect_all_rejected(store);

    let ctx = LifecycleContext::new();
    store.start(&ctx).unwrap();
    expect_kind(store, store.start(&ctx), ErrorKind::InvalidOperation);
    store.put("ns", b"k", b"v").unwrap();

    store.stop(&ctx).unwrap();
    assert_eq!(store.state(), LifecycleState::Stopped);
    expect_all_rejected(store);
    store.stop(&ctx).unwrap();
    expect_kind(store, store.start(&ctx), ErrorKind::InvalidOperation);
}

fn expect_all_rejected(store: &dyn KvStore) {
    let batch = WriteBatch::new();
    batch.put("ns", b"k", b"v");

    expect_kind(
        store,
        store.put("ns", b"k", b"v"),
        ErrorKind::InvalidOperation,
    );
    expect_kind(
        store,
        store.put_if_not_exists("ns", b"k", b"v"),
        ErrorKind::InvalidOperation,
    );
    expect_kind(store, store.get("ns", b"k"), ErrorKind::InvalidOperation);
    expect_kind(store, store.delete("ns", b"k"), ErrorKind::InvalidOperation);
    expect_kind(store, store.commit(&batch), ErrorKind::InvalidOperation);
    expect_kind(
        store,
        store.commit(&WriteBatch::new()),
        ErrorKind::InvalidOperation,
    );
    assert_eq!(
        batch.size(),
        1,
        "[{}] rejected commit touched batch",
        store.engine()
    );
}

/// Shares one store between threads and counts conflicts, for checks that
/// need an owned handle.
pub fn race_put_if_not_exists(store: Arc<dyn KvStore>, threads: usize) -> (usize, usize) {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.put_if_not_exists("race", b"owned", &(i as u64).to_be_bytes())
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.join().expect("racer panicked") {
            Ok(()) => wins += 1,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    (wins, conflicts)
}
