//! Conformance tests run against every backend.

use nskv_storage::{
    new_on_disk_store, ErrorKind, KvStore, LifecycleContext, LifecycleState, StoreError,
    WriteBatch,
};
use nskv_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Starts an on-disk store that can be shared across threads.
fn shared_store(kind: BackendKind) -> (Arc<dyn KvStore>, Option<TempDir>) {
    match kind {
        BackendKind::Memory => {
            let store: Arc<dyn KvStore> = Arc::from(nskv_storage::new_mem_store());
            store.start(&LifecycleContext::new()).unwrap();
            (store, None)
        }
        BackendKind::Redb | BackendKind::Sled => {
            let temp_dir = TempDir::new().unwrap();
            let store: Arc<dyn KvStore> =
                Arc::from(new_on_disk_store(on_disk_config(temp_dir.path(), kind)));
            store.start(&LifecycleContext::new()).unwrap();
            (store, Some(temp_dir))
        }
    }
}

#[test]
fn memory_store_conforms() {
    run_contract_suite(BackendKind::Memory);
}

#[test]
fn redb_store_conforms() {
    run_contract_suite(BackendKind::Redb);
}

#[test]
fn sled_store_conforms() {
    run_contract_suite(BackendKind::Sled);
}

#[test]
fn on_disk_records_survive_restart() {
    for kind in [BackendKind::Redb, BackendKind::Sled] {
        let test_store = TestStore::started(kind);
        test_store.put("blocks", b"h1", b"genesis").unwrap();
        test_store.put("blocks", b"h2", b"second").unwrap();
        test_store.delete("blocks", b"h2").unwrap();

        let batch = WriteBatch::new();
        batch.put("receipts", b"r1", b"ok");
        test_store.commit(&batch).unwrap();

        let test_store = test_store.reopen();
        assert_eq!(
            test_store.get("blocks", b"h1").unwrap(),
            b"genesis",
            "[{kind}]"
        );
        assert_eq!(
            test_store.get("blocks", b"h2").unwrap_err().kind(),
            ErrorKind::NotExist,
            "[{kind}]"
        );
        assert_eq!(
            test_store.get("receipts", b"r1").unwrap(),
            b"ok",
            "[{kind}]"
        );
    }
}

#[test]
fn on_disk_namespace_survives_restart_after_delete() {
    for kind in [BackendKind::Redb, BackendKind::Sled] {
        let test_store = TestStore::started(kind);
        test_store.put("state", b"k", b"v").unwrap();
        test_store.delete("state", b"k").unwrap();

        let test_store = test_store.reopen();
        assert_eq!(
            test_store.get("state", b"k").unwrap_err().kind(),
            ErrorKind::NotExist,
            "[{kind}]"
        );
    }
}

#[test]
fn second_store_on_same_directory_is_locked() {
    for kind in [BackendKind::Redb, BackendKind::Sled] {
        let test_store = TestStore::started(kind);
        let path = test_store.path().unwrap();

        let intruder = new_on_disk_store(on_disk_config(path, kind));
        let err = intruder.start(&LifecycleContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked, "[{kind}]");
    }
}

#[test]
fn stop_with_cancelled_context_releases_directory() {
    for kind in [BackendKind::Redb, BackendKind::Sled] {
        let test_store = TestStore::started(kind);
        test_store.put("ns", b"k", b"v").unwrap();
        let path = test_store.path().unwrap();

        let cancelled = LifecycleContext::new();
        cancelled.cancel();
        test_store.stop(&cancelled).unwrap();
        assert_eq!(test_store.state(), LifecycleState::Stopped, "[{kind}]");

        let successor = new_on_disk_store(on_disk_config(path, kind));
        successor.start(&LifecycleContext::new()).unwrap();
        assert_eq!(successor.get("ns", b"k").unwrap(), b"v", "[{kind}]");
        successor.stop(&LifecycleContext::new()).unwrap();
    }
}

#[test]
fn start_with_expired_context_opens_nothing() {
    for kind in [BackendKind::Redb, BackendKind::Sled] {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store");
        let store = new_on_disk_store(on_disk_config(&path, kind));

        let err = store
            .start(&LifecycleContext::with_timeout(Duration::ZERO))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation, "[{kind}]");
        assert_eq!(store.state(), LifecycleState::Created, "[{kind}]");
        assert!(!path.exists(), "[{kind}]");

        store.start(&LifecycleContext::new()).unwrap();
        assert!(path.join("LOCK").exists(), "[{kind}]");
        store.stop(&LifecycleContext::new()).unwrap();
    }
}

#[test]
fn put_if_not_exists_race_has_one_winner() {
    for kind in BackendKind::ALL {
        let (store, _temp_dir) = shared_store(kind);
        let (wins, conflicts) = race_put_if_not_exists(Arc::clone(&store), 16);
        assert_eq!((wins, conflicts), (1, 15), "[{kind}]");
        assert_eq!(store.get("race", b"owned").unwrap().len(), 8);
    }
}

#[test]
fn concurrent_writes_on_every_backend() {
    let config = StressConfig {
        operations: 2_000,
        threads: 4,
        key_count: 2_000,
        value_size: 32,
    };
    for kind in BackendKind::ALL {
        let (store, _temp_dir) = shared_store(kind);
        let result = stress_concurrent_writes(store, &config);
        assert_eq!(result.failed_ops, 0, "[{kind}]");
        assert_eq!(result.successful_ops, 2_000, "[{kind}]");
    }
}

#[test]
fn concurrent_batches_on_every_backend() {
    let config = StressConfig {
        operations: 1_600,
        threads: 4,
        value_size: 32,
        ..Default::default()
    };
    for kind in BackendKind::ALL {
        let (store, _temp_dir) = shared_store(kind);
        let result = stress_concurrent_batches(store, &config, 40);
        assert_eq!(result.failed_ops, 0, "[{kind}]");
    }
}

#[test]
fn put_if_not_exists_races_on_every_backend() {
    let config = StressConfig {
        operations: 160,
        threads: 8,
        ..Default::default()
    };
    for kind in BackendKind::ALL {
        let (store, _temp_dir) = shared_store(kind);
        let result = stress_put_if_not_exists_races(store, &config);
        assert_eq!(result.failed_ops, 0, "[{kind}]");
        assert_eq!(result.successful_ops, 20, "[{kind}]");
    }
}

#[test]
fn stopped_store_rejects_operations() {
    for kind in BackendKind::ALL {
        let test_store = TestStore::started(kind);
        test_store.put("ns", b"k", b"v").unwrap();
        test_store.stop(&LifecycleContext::new()).unwrap();

        let err: StoreError = test_store.get("ns", b"k").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation, "[{kind}]");
        assert_eq!(
            test_store.start(&LifecycleContext::new()).unwrap_err().kind(),
            ErrorKind::InvalidOperation,
            "[{kind}]"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn memory_store_matches_model(ops in store_ops_strategy(40)) {
        let test_store = TestStore::memory();
        if let Err(divergence) = check_against_model(&*test_store, &ops) {
            prop_assert!(false, "{}", divergence);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn redb_store_matches_model(ops in store_ops_strategy(40)) {
        let test_store = TestStore::redb();
        if let Err(divergence) = check_against_model(&*test_store, &ops) {
            prop_assert!(false, "{}", divergence);
        }
    }

    #[test]
    fn sled_store_matches_model(ops in store_ops_strategy(40)) {
        let test_store = TestStore::sled();
        if let Err(divergence) = check_against_model(&*test_store, &ops) {
            prop_assert!(false, "{}", divergence);
        }
    }
}
