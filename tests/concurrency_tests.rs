//! Concurrency tests for SlotStore
//!
//! These tests verify that the store lock serializes mixed operations from
//! many threads without losing writes or corrupting the file.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use slotkv::slot::DEFAULT_SLOT_SIZE;
use slotkv::{Config, Lookup, SlotStore};
use tempfile::TempDir;

fn setup_shared_store() -> (TempDir, Arc<SlotStore>) {
    let temp_dir = TempDir::new().unwrap();
    let store = SlotStore::open_path(&temp_dir.path().join("uota.kv")).unwrap();
    (temp_dir, Arc::new(store))
}

#[test]
fn test_concurrent_writers_distinct_keys() {
    let (_temp, store) = setup_shared_store();
    let num_threads = 8;
    let per_thread = 20;

    let mut handles = vec![];
    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                let key = format!("thread{}_key{}", t, i);
                let value = format!("thread{}_value{}", t, i);
                store.set(&key, value.as_bytes()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.slot_count().unwrap(), num_threads * per_thread);
    for t in 0..num_threads {
        for i in 0..per_thread {
            let key = format!("thread{}_key{}", t, i);
            let expected = format!("thread{}_value{}", t, i);
            assert_eq!(
                store.get(&key).unwrap(),
                Lookup::Found(Bytes::from(expected))
            );
        }
    }
    assert!(store.verify().unwrap().is_clean());
}

#[test]
fn test_concurrent_writers_same_key_never_duplicate() {
    let (_temp, store) = setup_shared_store();

    crossbeam::scope(|scope| {
        for t in 0..8 {
            let store = &store;
            scope.spawn(move |_| {
                for i in 0..25 {
                    store.set("dl_off", format!("{}:{}", t, i).as_bytes()).unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(store.slot_count().unwrap(), 1);
    assert_eq!(
        std::fs::metadata(store.path()).unwrap().len(),
        DEFAULT_SLOT_SIZE as u64
    );
    assert!(store.get("dl_off").unwrap().is_found());
}

#[test]
fn test_concurrent_set_and_delete() {
    let (_temp, store) = setup_shared_store();

    for i in 0..50 {
        store.set(&format!("stable{}", i), b"keep").unwrap();
    }

    crossbeam::scope(|scope| {
        for t in 0..4 {
            let store = &store;
            scope.spawn(move |_| {
                for i in 0..30 {
                    let key = format!("churn{}_{}", t, i);
                    store.set(&key, b"tmp").unwrap();
                    store.delete(&key).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let store = &store;
            scope.spawn(move |_| {
                for i in 0..50 {
                    let key = format!("stable{}", i);
                    assert_eq!(
                        store.get(&key).unwrap(),
                        Lookup::Found(Bytes::from_static(b"keep"))
                    );
                }
            });
        }
    })
    .unwrap();

    assert_eq!(store.slot_count().unwrap(), 50);
    assert!(store.verify().unwrap().is_clean());
}

#[test]
fn test_bounded_lock_wait_succeeds_when_uncontended() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("uota.kv"))
        .lock_timeout(Duration::from_secs(5))
        .build();
    let store = Arc::new(SlotStore::open(config).unwrap());

    let mut handles = vec![];
    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.set(&format!("k{}", t), b"v").unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.slot_count().unwrap(), 4);
}
