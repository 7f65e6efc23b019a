// Store Tests
// Tests for the file-per-block store

use p2pledger::ledger::{Ledger, GENESIS_PREVIOUS_HASH};
use p2pledger::storage::{BlockStore, StoreError};
use std::fs;
use tempfile::TempDir;

fn sample_ledger() -> Ledger {
    let mut ledger = Ledger::new();
    for i in 0..12 {
        ledger.extend_last_or_append(format!("angel, A{}, {}", i % 3, i + 1));
    }
    ledger
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn test_save_and_reload_preserves_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    let ledger = sample_ledger();

    store.save_all(&ledger).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, ledger);
    assert_eq!(loaded.last_hash(), ledger.last_hash());
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_reopen_existing_dir() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = BlockStore::open(temp_dir.path()).unwrap();
        store.save_all(&sample_ledger()).unwrap();
    }

    let store = BlockStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.block_count(), 3);
    assert_eq!(store.load().unwrap().transaction_count(), 12);
}

#[test]
fn test_open_creates_nested_dir() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("node1").join("blocks");

    let store = BlockStore::open(&nested).unwrap();
    assert!(nested.is_dir());
    assert_eq!(store.dir(), nested.as_path());
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[test]
fn test_block_file_layout() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    let mut ledger = Ledger::new();
    ledger.extend_last_or_append("angel, A, 50".into());
    store.save_block(&ledger, 1).unwrap();

    let text = fs::read_to_string(store.path_for(1)).unwrap();
    assert_eq!(
        text,
        format!(
            "Sha256 of previous block: {}\nNext block: None\nangel, A, 50\n",
            GENESIS_PREVIOUS_HASH
        )
    );
}

#[test]
fn test_save_block_updates_predecessor_pointer() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    let mut ledger = Ledger::new();

    for i in 0..6 {
        let index = ledger.extend_last_or_append(format!("angel, A, {}", i));
        store.save_block(&ledger, index).unwrap();
    }

    let first = store.read_raw(1).unwrap().unwrap();
    let second = store.read_raw(2).unwrap().unwrap();
    assert!(first.contains("Next block: 2.txt"));
    assert!(second.contains("Next block: None"));
}

#[test]
fn test_load_stops_at_gap() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    store.save_all(&sample_ledger()).unwrap();

    fs::remove_file(store.path_for(2)).unwrap();

    assert_eq!(store.load().unwrap().len(), 1);
    assert_eq!(store.contents().unwrap().len(), 1);
}

#[test]
fn test_edited_file_is_detected_as_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    store.save_all(&sample_ledger()).unwrap();

    let text = store.read_raw(1).unwrap().unwrap();
    store.write_raw(1, &text.replace("angel, A0, 1", "angel, A0, 1000")).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(
        loaded.validate(),
        Err(p2pledger::ledger::LedgerError::ChainCorrupt(2))
    );
}

#[test]
fn test_missing_header_is_malformed() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    store.write_raw(1, "angel, A, 50\n").unwrap();

    let result = store.load();
    assert!(matches!(result, Err(StoreError::MalformedBlock { index: 1, .. })));
}

// ============================================================================
// RAW ACCESS
// ============================================================================

#[test]
fn test_read_raw_absent_is_none() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();

    assert!(store.read_raw(1).unwrap().is_none());
}

#[test]
fn test_raw_round_trip_is_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    let content = "Sha256 of previous block: abc\nNext block: None\nA, B, 1\n";

    store.write_raw(4, content).unwrap();
    assert_eq!(store.read_raw(4).unwrap().as_deref(), Some(content));
}

#[test]
fn test_zero_index_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();

    assert!(matches!(store.read_raw(0), Err(StoreError::InvalidIndex)));
    assert!(matches!(store.write_raw(0, "x"), Err(StoreError::InvalidIndex)));
}

#[test]
fn test_remove_raw_tolerates_absent_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = BlockStore::open(temp_dir.path()).unwrap();
    store.write_raw(1, "Sha256 of previous block: abc\nNext block: None\n").unwrap();

    store.remove_raw(1).unwrap();
    store.remove_raw(1).unwrap();

    assert!(store.read_raw(1).unwrap().is_none());
}
