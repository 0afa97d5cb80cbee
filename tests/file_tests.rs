//! Tests for SlotFile and atomic replace

use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use slotkv::file::{replace_atomically, sync_parent_dir, temp_path, SlotFile};
use slotkv::slot::{Slot, DEFAULT_SLOT_SIZE};
use slotkv::SlotError;
use tempfile::TempDir;

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("uota.kv");
    (temp_dir, path)
}

fn encoded(key: &str, value: &[u8]) -> Vec<u8> {
    Slot::new(key, Bytes::copy_from_slice(value))
        .unwrap()
        .encode(DEFAULT_SLOT_SIZE)
        .unwrap()
}

#[test]
fn test_open_creates_file() {
    let (_temp, path) = setup_temp_file();

    let file = SlotFile::open(&path, DEFAULT_SLOT_SIZE).unwrap();

    assert!(path.exists());
    assert!(file.is_empty());
    assert_eq!(file.slot_count(), 0);
}

#[test]
fn test_open_rejects_misaligned() {
    let (_temp, path) = setup_temp_file();
    fs::write(&path, vec![0u8; DEFAULT_SLOT_SIZE + 1]).unwrap();

    let result = SlotFile::open(&path, DEFAULT_SLOT_SIZE);

    assert!(matches!(result, Err(SlotError::Misaligned { .. })));
}

#[test]
fn test_open_rejects_undersized_slot() {
    let (_temp, path) = setup_temp_file();

    for slot_size in [0, 1, 395] {
        let result = SlotFile::open(&path, slot_size);
        assert!(matches!(result, Err(SlotError::Config(_))));
    }
    assert!(!path.exists());
}

#[test]
fn test_append_read_write_slots() {
    let (_temp, path) = setup_temp_file();
    let mut file = SlotFile::open(&path, DEFAULT_SLOT_SIZE).unwrap();

    assert_eq!(file.append(&encoded("a", b"1")).unwrap(), 0);
    assert_eq!(file.append(&encoded("b", b"2")).unwrap(), 1);
    file.write_slot(0, &encoded("c", b"3")).unwrap();
    file.flush(true).unwrap();

    assert_eq!(file.len(), 2 * DEFAULT_SLOT_SIZE as u64);
    assert_eq!(file.offset_of(1), DEFAULT_SLOT_SIZE as u64);

    let mut buf = vec![0u8; DEFAULT_SLOT_SIZE];
    file.read_slot(0, &mut buf).unwrap();
    assert_eq!(buf, encoded("c", b"3"));

    let keys = {
        let mut keys = Vec::new();
        file.scan(|_, raw| {
            keys.push(raw.key());
            Ok(None::<()>)
        })
        .unwrap();
        keys
    };
    assert_eq!(keys, vec!["c", "b"]);
}

#[test]
fn test_scan_stops_at_first_match() {
    let (_temp, path) = setup_temp_file();
    let mut file = SlotFile::open(&path, DEFAULT_SLOT_SIZE).unwrap();
    for key in ["a", "b", "b", "c"] {
        file.append(&encoded(key, key.as_bytes())).unwrap();
    }

    let mut visited = 0;
    let found = file
        .scan(|index, raw| {
            visited += 1;
            Ok(raw.key_matches("b").then_some(index))
        })
        .unwrap();

    assert_eq!(found, Some(1));
    assert_eq!(visited, 2);
}

#[test]
fn test_read_past_end_is_short_read() {
    let (_temp, path) = setup_temp_file();
    let mut file = SlotFile::open(&path, DEFAULT_SLOT_SIZE).unwrap();
    file.append(&encoded("a", b"1")).unwrap();

    let mut buf = vec![0u8; DEFAULT_SLOT_SIZE];
    let result = file.read_slot(1, &mut buf);

    assert!(matches!(result, Err(SlotError::ShortRead { offset }) if offset == DEFAULT_SLOT_SIZE as u64));
}

#[test]
fn test_temp_path() {
    assert_eq!(
        temp_path(&PathBuf::from("/data/uota.kv")),
        PathBuf::from("/data/uota.kv.tmp")
    );
    assert_eq!(temp_path(&PathBuf::from("store")), PathBuf::from("store.tmp"));
}

#[test]
fn test_replace_atomically() {
    let (temp, path) = setup_temp_file();
    fs::write(&path, b"old contents").unwrap();

    replace_atomically(&path, b"new", true).unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"new");
    assert!(!temp_path(&path).exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn test_replace_atomically_overwrites_stale_temp() {
    let (_temp, path) = setup_temp_file();
    fs::write(temp_path(&path), b"leftover from a crash").unwrap();

    replace_atomically(&path, b"fresh", false).unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"fresh");
    assert!(!temp_path(&path).exists());
}

#[test]
fn test_failed_replace_removes_temp_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("occupied");
    fs::create_dir(&path).unwrap();
    fs::write(path.join("inner"), b"x").unwrap();

    // Renaming a file over a directory fails after the temp file is written
    let result = replace_atomically(&path, b"contents", false);

    assert!(matches!(result, Err(SlotError::Io(_))));
    assert!(!temp_path(&path).exists());
    assert!(path.is_dir());
}

#[test]
fn test_failed_replace_leaves_target_untouched() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("occupied");
    fs::create_dir(&path).unwrap();

    assert!(replace_atomically(&path, b"contents", true).is_err());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[cfg(unix)]
#[test]
fn test_sync_parent_dir_reports_missing_directory() {
    let temp = TempDir::new().unwrap();

    assert!(sync_parent_dir(&temp.path().join("uota.kv")).is_ok());
    assert!(sync_parent_dir(&temp.path().join("gone").join("uota.kv")).is_err());
}

#[test]
fn test_replace_creates_missing_target() {
    let (_temp, path) = setup_temp_file();

    replace_atomically(&path, b"first", true).unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"first");
    assert!(!temp_path(&path).exists());
}
