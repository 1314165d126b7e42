#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use promptproof_contracts::{ContractViolation, Receipt, ReceiptContent, ReceiptDocument, ReceiptId};
use serde::{Deserialize, Serialize};

const JOURNAL_SCHEMA_VERSION: u8 = 1;

#[derive(Debug)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    ContractViolation(ContractViolation),
    Journal { op: &'static str, detail: String },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey { table, key } => {
                write!(f, "duplicate key in table {table}: {key}")
            }
            Self::ContractViolation(violation) => write!(f, "contract violation: {violation:?}"),
            Self::Journal { op, detail } => write!(f, "journal {op} failed: {detail}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReceiptJournalEntry {
    schema_version: u8,
    receipt: ReceiptDocument,
}

impl ReceiptJournalEntry {
    fn v1(receipt: ReceiptDocument) -> Self {
        Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            receipt,
        }
    }
}

/// Write-once, read-many receipt table. Ids are allocated from a monotonic
/// sequence; the digest column carries a unique index. Records become
/// durable (journal append + fsync) before the insert returns.
#[derive(Debug)]
pub struct ReceiptStore {
    receipts: BTreeMap<ReceiptId, Receipt>,
    hash_index: BTreeMap<String, ReceiptId>,
    next_receipt_seq: u64,
    journal_path: Option<PathBuf>,
}

impl ReceiptStore {
    pub fn new_in_memory() -> Self {
        Self {
            receipts: BTreeMap::new(),
            hash_index: BTreeMap::new(),
            next_receipt_seq: 0,
            journal_path: None,
        }
    }

    /// Opens (creating if needed) a JSONL journal at `journal_path` and
    /// replays any existing entries into the in-memory tables. A corrupt or
    /// unsupported journal is a hard open failure, never a silent skip.
    pub fn new_with_persistence(journal_path: PathBuf) -> Result<Self, StorageError> {
        let mut store = Self::new_in_memory();
        store.journal_path = Some(journal_path);
        store.ensure_journal_ready()?;
        store.replay_journal()?;
        Ok(store)
    }

    /// Assigns the next id, enforces digest uniqueness, journals the row,
    /// and only then commits it to the table. Uniqueness and id allocation
    /// both happen under `&mut self`, so there is no check-then-act window
    /// between them.
    pub fn insert_receipt_row(
        &mut self,
        content: ReceiptContent,
        hash: String,
    ) -> Result<Receipt, StorageError> {
        if self.hash_index.contains_key(&hash) {
            return Err(StorageError::DuplicateKey {
                table: "receipts",
                key: hash,
            });
        }
        let receipt_id = ReceiptId(self.next_receipt_seq + 1);
        let receipt = Receipt::v1(receipt_id, content, hash)?;
        self.append_journal_entry(&receipt)?;
        self.commit_row(receipt.clone());
        Ok(receipt)
    }

    pub fn receipt_row(&self, receipt_id: ReceiptId) -> Option<&Receipt> {
        self.receipts.get(&receipt_id)
    }

    pub fn receipt_rows(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.values()
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }

    fn commit_row(&mut self, receipt: Receipt) {
        self.hash_index
            .insert(receipt.hash.clone(), receipt.receipt_id);
        self.next_receipt_seq = self.next_receipt_seq.max(receipt.receipt_id.0);
        self.receipts.insert(receipt.receipt_id, receipt);
    }

    fn ensure_journal_ready(&self) -> Result<(), StorageError> {
        let Some(path) = self.journal_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StorageError::Journal {
                op: "create_dir",
                detail: format!("'{}': {}", parent.display(), err),
            })?;
        }
        if !path.exists() {
            File::create(path).map_err(|err| StorageError::Journal {
                op: "create",
                detail: format!("'{}': {}", path.display(), err),
            })?;
        }
        Ok(())
    }

    fn replay_journal(&mut self) -> Result<(), StorageError> {
        let Some(path) = self.journal_path.clone() else {
            return Ok(());
        };
        let file = File::open(&path).map_err(|err| StorageError::Journal {
            op: "open",
            detail: format!("'{}': {}", path.display(), err),
        })?;
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.map_err(|err| StorageError::Journal {
                op: "read",
                detail: format!("'{}' line {}: {}", path.display(), line_no + 1, err),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReceiptJournalEntry =
                serde_json::from_str(&line).map_err(|err| StorageError::Journal {
                    op: "parse",
                    detail: format!("'{}' line {}: {}", path.display(), line_no + 1, err),
                })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(StorageError::Journal {
                    op: "parse",
                    detail: format!(
                        "unsupported schema_version={} at line {}",
                        entry.schema_version,
                        line_no + 1
                    ),
                });
            }
            let receipt = Receipt::from_document(entry.receipt)?;
            if self.receipts.contains_key(&receipt.receipt_id) {
                return Err(StorageError::DuplicateKey {
                    table: "receipts",
                    key: receipt.receipt_id.0.to_string(),
                });
            }
            if self.hash_index.contains_key(&receipt.hash) {
                return Err(StorageError::DuplicateKey {
                    table: "receipts",
                    key: receipt.hash,
                });
            }
            self.commit_row(receipt);
        }
        Ok(())
    }

    fn append_journal_entry(&self, receipt: &Receipt) -> Result<(), StorageError> {
        let Some(path) = self.journal_path.as_ref() else {
            return Ok(());
        };
        let entry = ReceiptJournalEntry::v1(receipt.to_document());
        let json = serde_json::to_string(&entry).map_err(|err| StorageError::Journal {
            op: "encode",
            detail: err.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| StorageError::Journal {
                op: "open_append",
                detail: format!("'{}': {}", path.display(), err),
            })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| StorageError::Journal {
                op: "append",
                detail: format!("'{}': {}", path.display(), err),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptproof_contracts::receipt_digest;

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

    #[test]
    fn insert_assigns_monotonic_ids_starting_at_one() {
        let mut store = ReceiptStore::new_in_memory();
        let a = content("a?", "a");
        let b = content("b?", "b");
        let first = store.insert_receipt_row(a.clone(), hash_of(&a)).unwrap();
        let second = store.insert_receipt_row(b.clone(), hash_of(&b)).unwrap();
        assert_eq!(first.receipt_id, ReceiptId(1));
        assert_eq!(second.receipt_id, ReceiptId(2));
    }

    #[test]
    fn duplicate_hash_is_rejected_atomically() {
        let mut store = ReceiptStore::new_in_memory();
        let c = content("same", "same");
        store.insert_receipt_row(c.clone(), hash_of(&c)).unwrap();
        let err = store
            .insert_receipt_row(c.clone(), hash_of(&c))
            .expect_err("duplicate digest must fail");
        assert!(matches!(err, StorageError::DuplicateKey { table: "receipts", .. }));
        // The failed insert must not consume an id.
        let d = content("other", "other");
        let next = store.insert_receipt_row(d.clone(), hash_of(&d)).unwrap();
        assert_eq!(next.receipt_id, ReceiptId(2));
    }

    #[test]
    fn lookup_of_unknown_id_is_none() {
        let store = ReceiptStore::new_in_memory();
        assert!(store.receipt_row(ReceiptId(999_999)).is_none());
    }
}
