#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use promptproof_contracts::{receipt_digest, ReceiptContent, ReceiptId};
use promptproof_storage::{ReceiptStore, StorageError};

fn content(prompt: &str, response: &str) -> ReceiptContent {
    ReceiptContent::v1(
        "2025-01-01T00:00:00Z".to_string(),
        "gpt-4o-mini".to_string(),
        prompt.to_string(),
        response.to_string(),
    )
}

fn hash_of(c: &ReceiptContent) -> String {
    receipt_digest(&c.timestamp, &c.model, &c.prompt, &c.response)
}

fn temp_journal(name: &str) -> (PathBuf, PathBuf) {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    let base = std::env::temp_dir().join(format!("promptproof-db-wiring-{name}-{suffix}"));
    let journal = base.join("receipts.jsonl");
    (base, journal)
}

#[test]
fn at_receipts_db_01_roundtrip_by_assigned_id() {
    let mut store = ReceiptStore::new_in_memory();
    let c = content("2+2?", "4");
    let inserted = store.insert_receipt_row(c.clone(), hash_of(&c)).unwrap();

    let fetched = store
        .receipt_row(inserted.receipt_id)
        .expect("inserted row must be readable");
    assert_eq!(fetched.content, c);
    assert_eq!(fetched.hash, hash_of(&c));
    assert_eq!(fetched.receipt_id, inserted.receipt_id);
}

#[test]
fn at_receipts_db_02_hash_uniqueness_enforced_by_store() {
    let mut store = ReceiptStore::new_in_memory();
    let c = content("2+2?", "4");
    store.insert_receipt_row(c.clone(), hash_of(&c)).unwrap();
    let err = store
        .insert_receipt_row(c.clone(), hash_of(&c))
        .expect_err("same digest twice must be rejected");
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "receipts",
            ..
        }
    ));
    assert_eq!(store.receipt_count(), 1);
}

#[test]
fn at_receipts_db_03_missing_id_is_not_found() {
    let store = ReceiptStore::new_in_memory();
    assert!(store.receipt_row(ReceiptId(999_999)).is_none());
}

#[test]
fn at_receipts_db_04_journal_persists_and_replays_rows() {
    let (base, journal) = temp_journal("replay");

    let inserted = {
        let mut store = ReceiptStore::new_with_persistence(journal.clone()).unwrap();
        let a = content("2+2?", "4");
        let b = content("3+3?", "6");
        let first = store.insert_receipt_row(a.clone(), hash_of(&a)).unwrap();
        store.insert_receipt_row(b.clone(), hash_of(&b)).unwrap();
        first
    };

    let reopened = ReceiptStore::new_with_persistence(journal).unwrap();
    assert_eq!(reopened.receipt_count(), 2);
    let replayed = reopened
        .receipt_row(inserted.receipt_id)
        .expect("journaled row must survive reopen");
    assert_eq!(replayed, &inserted);

    // Ids keep increasing after replay, never reusing an existing one.
    let mut reopened = reopened;
    let c = content("4+4?", "8");
    let next = reopened.insert_receipt_row(c.clone(), hash_of(&c)).unwrap();
    assert_eq!(next.receipt_id, ReceiptId(3));

    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_receipts_db_05_corrupt_journal_line_fails_open() {
    let (base, journal) = temp_journal("corrupt");
    fs::create_dir_all(&base).unwrap();
    fs::write(&journal, "{not valid json}\n").unwrap();

    let err = ReceiptStore::new_with_persistence(journal).expect_err("corrupt journal must fail");
    assert!(matches!(err, StorageError::Journal { op: "parse", .. }));
    fs::remove_dir_all(base).unwrap();
}
