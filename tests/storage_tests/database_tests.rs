//! Tests for the LMDB storage layer
//!
//! These tests verify:
//! - Opening/creating the environment directory
//! - Single-operation get/put/del in the default and named sub-databases
//! - Create-only writes
//! - Listing and dropping sub-databases
//! - Sub-database handles resolved from many threads at once
//! - Transaction commit and rollback
//! - Engine limits (map full, too many sub-databases)
//! - Persistence across reopen

use std::ops::ControlFlow;
use std::thread;

use finedb::storage::Storage;
use finedb::{Config, FineError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_storage() -> (TempDir, Storage) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();
    let storage = Storage::open(&config).unwrap();
    (temp_dir, storage)
}

fn keys(storage: &Storage, dbname: Option<&str>) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    storage
        .list(None, dbname, |key, _| {
            keys.push(key.to_vec());
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
    keys
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("new_env");
    assert!(!path.exists());

    let config = Config::builder().data_dir(&path).build();
    let _storage = Storage::open(&config).unwrap();

    assert!(path.is_dir());
    assert!(path.join("data.mdb").exists());
}

#[test]
fn test_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();

    let storage = Storage::open(&config).unwrap();
    storage.put(None, None, b"key", b"value", false).unwrap();
    storage.put(None, Some("named"), b"key", b"other", false).unwrap();
    storage.close();

    let storage = Storage::open(&config).unwrap();
    assert_eq!(storage.get(None, None, b"key").unwrap(), b"value");
    assert_eq!(storage.get(None, Some("named"), b"key").unwrap(), b"other");
}

// =============================================================================
// Single Operation Tests
// =============================================================================

#[test]
fn test_put_get_default_database() {
    let (_temp, storage) = open_storage();

    storage.put(None, None, b"user:1", b"active", false).unwrap();

    assert_eq!(storage.get(None, None, b"user:1").unwrap(), b"active");
}

#[test]
fn test_put_overwrites() {
    let (_temp, storage) = open_storage();

    storage.put(None, None, b"key", b"v1", false).unwrap();
    storage.put(None, None, b"key", b"v2", false).unwrap();

    assert_eq!(storage.get(None, None, b"key").unwrap(), b"v2");
}

#[test]
fn test_get_missing_key() {
    let (_temp, storage) = open_storage();

    let result = storage.get(None, None, b"missing");
    assert!(matches!(result, Err(FineError::KeyNotFound)));
}

#[test]
fn test_get_missing_sub_database() {
    let (_temp, storage) = open_storage();

    let result = storage.get(None, Some("nowhere"), b"key");
    assert!(matches!(result, Err(FineError::DatabaseNotFound(_))));
}

#[test]
fn test_sub_databases_are_isolated() {
    let (_temp, storage) = open_storage();

    storage.put(None, Some("x"), b"k", b"1", false).unwrap();
    storage.put(None, Some("y"), b"k", b"2", false).unwrap();

    assert_eq!(storage.get(None, Some("x"), b"k").unwrap(), b"1");
    assert_eq!(storage.get(None, Some("y"), b"k").unwrap(), b"2");
    assert!(matches!(
        storage.get(None, None, b"k"),
        Err(FineError::KeyNotFound)
    ));
}

#[test]
fn test_create_only_put() {
    let (_temp, storage) = open_storage();

    storage.put(None, None, b"key", b"first", true).unwrap();
    let result = storage.put(None, None, b"key", b"second", true);

    assert!(matches!(result, Err(FineError::KeyExists)));
    assert_eq!(storage.get(None, None, b"key").unwrap(), b"first");
}

#[test]
fn test_del() {
    let (_temp, storage) = open_storage();
    storage.put(None, None, b"key", b"value", false).unwrap();

    storage.del(None, None, b"key").unwrap();

    assert!(matches!(
        storage.get(None, None, b"key"),
        Err(FineError::KeyNotFound)
    ));
    assert!(matches!(
        storage.del(None, None, b"key"),
        Err(FineError::KeyNotFound)
    ));
}

// =============================================================================
// List / Drop Tests
// =============================================================================

#[test]
fn test_list_in_key_order() {
    let (_temp, storage) = open_storage();
    for key in [b"c", b"a", b"b"] {
        storage.put(None, Some("letters"), key, b"v", false).unwrap();
    }

    assert_eq!(
        keys(&storage, Some("letters")),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
    );
}

#[test]
fn test_list_missing_sub_database_is_empty() {
    let (_temp, storage) = open_storage();

    assert!(keys(&storage, Some("empty")).is_empty());
}

#[test]
fn test_list_stops_on_break() {
    let (_temp, storage) = open_storage();
    for key in [b"a", b"b", b"c"] {
        storage.put(None, None, key, b"v", false).unwrap();
    }

    let mut seen = 0;
    storage
        .list(None, None, |_, _| {
            seen += 1;
            Ok(ControlFlow::Break(()))
        })
        .unwrap();

    assert_eq!(seen, 1);
}

#[test]
fn test_list_callback_error_propagates() {
    let (_temp, storage) = open_storage();
    storage.put(None, None, b"a", b"v", false).unwrap();

    let result = storage.list(None, None, |_, _| Err(FineError::Protocol("stop".into())));

    assert!(matches!(result, Err(FineError::Protocol(_))));
}

#[test]
fn test_drop_deletes_sub_database() {
    let (_temp, storage) = open_storage();
    storage.put(None, Some("tmp"), b"a", b"1", false).unwrap();
    storage.put(None, Some("tmp"), b"b", b"2", false).unwrap();
    storage.put(None, Some("keep"), b"a", b"3", false).unwrap();

    storage.drop_db(None, "tmp").unwrap();

    assert!(keys(&storage, Some("tmp")).is_empty());
    assert_eq!(storage.get(None, Some("keep"), b"a").unwrap(), b"3");
}

#[test]
fn test_drop_frees_sub_database_slot() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_dbs(2)
        .build();
    let storage = Storage::open(&config).unwrap();

    for i in 0..5 {
        let name = format!("cycle-{}", i);
        storage.put(None, Some(&name), b"k", b"v", false).unwrap();
        storage.drop_db(None, &name).unwrap();
    }

    assert!(matches!(
        storage.get(None, Some("cycle-0"), b"k"),
        Err(FineError::DatabaseNotFound(_))
    ));
    storage.put(None, Some("one"), b"k", b"v", false).unwrap();
    storage.put(None, Some("two"), b"k", b"v", false).unwrap();
}

#[test]
fn test_drop_rolled_back_keeps_sub_database() {
    let (_temp, storage) = open_storage();
    storage.put(None, Some("tmp"), b"a", b"1", false).unwrap();

    let mut txn = storage.begin().unwrap();
    storage.drop_db(Some(&mut txn), "tmp").unwrap();
    assert!(matches!(
        storage.get(Some(&mut txn), Some("tmp"), b"a"),
        Err(FineError::DatabaseNotFound(_))
    ));
    Storage::rollback(txn);

    assert_eq!(storage.get(None, Some("tmp"), b"a").unwrap(), b"1");
}

#[test]
fn test_drop_missing_sub_database() {
    let (_temp, storage) = open_storage();

    let result = storage.drop_db(None, "never");
    assert!(matches!(result, Err(FineError::DatabaseNotFound(_))));
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_transaction_commit() {
    let (_temp, storage) = open_storage();

    let mut txn = storage.begin().unwrap();
    storage.put(Some(&mut txn), Some("t"), b"a", b"1", false).unwrap();
    storage.put(Some(&mut txn), Some("t"), b"b", b"2", false).unwrap();
    assert_eq!(storage.get(Some(&mut txn), Some("t"), b"a").unwrap(), b"1");
    Storage::commit(txn).unwrap();

    assert_eq!(keys(&storage, Some("t")), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_transaction_rollback() {
    let (_temp, storage) = open_storage();
    storage.put(None, None, b"kept", b"1", false).unwrap();

    let mut txn = storage.begin().unwrap();
    storage.put(Some(&mut txn), None, b"discarded", b"2", false).unwrap();
    storage.del(Some(&mut txn), None, b"kept").unwrap();
    Storage::rollback(txn);

    assert_eq!(storage.get(None, None, b"kept").unwrap(), b"1");
    assert!(matches!(
        storage.get(None, None, b"discarded"),
        Err(FineError::KeyNotFound)
    ));
}

#[test]
fn test_failed_operation_inside_transaction_keeps_it_usable() {
    let (_temp, storage) = open_storage();

    let mut txn = storage.begin().unwrap();
    storage.put(Some(&mut txn), None, b"a", b"1", true).unwrap();
    assert!(storage.put(Some(&mut txn), None, b"a", b"2", true).is_err());
    storage.put(Some(&mut txn), None, b"b", b"3", false).unwrap();
    Storage::commit(txn).unwrap();

    assert_eq!(storage.get(None, None, b"a").unwrap(), b"1");
    assert_eq!(storage.get(None, None, b"b").unwrap(), b"3");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_reads_resolve_sub_databases() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();

    let storage = Storage::open(&config).unwrap();
    for db in 0..8 {
        let name = format!("db-{}", db);
        storage.put(None, Some(&name), b"k", name.as_bytes(), false).unwrap();
    }
    storage.close();

    // Freshly opened: no handle has been resolved yet
    let storage = Storage::open(&config).unwrap();
    thread::scope(|scope| {
        for reader in 0..8 {
            let storage = &storage;
            scope.spawn(move || {
                for round in 0..50 {
                    let name = format!("db-{}", (reader + round) % 8);
                    let value = storage.get(None, Some(&name), b"k").unwrap();
                    assert_eq!(value, name.as_bytes());
                }
            });
        }

        let storage = &storage;
        scope.spawn(move || {
            for i in 0..50u32 {
                let name = format!("new-{}", i % 4);
                storage.put(None, Some(&name), &i.to_be_bytes(), b"v", false).unwrap();
            }
        });
    });

    assert_eq!(keys(&storage, Some("new-0")).len(), 13);
}

#[test]
fn test_reads_wait_for_transaction_resolving_handles() {
    let (_temp, storage) = open_storage();
    storage.put(None, Some("shared"), b"k", b"before", false).unwrap();

    let mut txn = storage.begin().unwrap();
    storage.put(Some(&mut txn), Some("private"), b"k", b"v", false).unwrap();

    thread::scope(|scope| {
        let reader = scope.spawn(|| storage.get(None, Some("shared"), b"k").unwrap());
        storage.put(Some(&mut txn), Some("shared"), b"k", b"after", false).unwrap();
        Storage::commit(txn).unwrap();

        // Resolved only once the transaction ended, so it sees its writes
        assert_eq!(reader.join().unwrap(), b"after");
    });
}

// =============================================================================
// Limit Tests
// =============================================================================

#[test]
fn test_map_full() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .map_size(256 * 1024)
        .build();
    let storage = Storage::open(&config).unwrap();
    let value = vec![0xabu8; 64 * 1024];

    let mut failure = None;
    for i in 0..64u32 {
        if let Err(e) = storage.put(None, None, &i.to_be_bytes(), &value, false) {
            failure = Some(e);
            break;
        }
    }

    assert!(matches!(failure, Some(FineError::MapFull)));
}

#[test]
fn test_too_many_sub_databases() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_dbs(2)
        .build();
    let storage = Storage::open(&config).unwrap();

    storage.put(None, Some("one"), b"k", b"v", false).unwrap();
    storage.put(None, Some("two"), b"k", b"v", false).unwrap();
    let result = storage.put(None, Some("three"), b"k", b"v", false);

    assert!(matches!(result, Err(FineError::TooManyDatabases)));
}
