#![forbid(unsafe_code)]

use promptproof_contracts::{Receipt, ReceiptContent, ReceiptId};

use crate::receipts::{ReceiptStore, StorageError};

/// Typed repository interface for the receipts table. The table is
/// write-once, read-many: no update or delete operation exists.
pub trait ReceiptRepo {
    fn insert_receipt_row(
        &mut self,
        content: ReceiptContent,
        hash: String,
    ) -> Result<Receipt, StorageError>;
    fn receipt_row(&self, receipt_id: ReceiptId) -> Option<&Receipt>;
    fn receipt_count(&self) -> usize;
}

impl ReceiptRepo for ReceiptStore {
    fn insert_receipt_row(
        &mut self,
        content: ReceiptContent,
        hash: String,
    ) -> Result<Receipt, StorageError> {
        ReceiptStore::insert_receipt_row(self, content, hash)
    }

    fn receipt_row(&self, receipt_id: ReceiptId) -> Option<&Receipt> {
        ReceiptStore::receipt_row(self, receipt_id)
    }

    fn receipt_count(&self) -> usize {
        ReceiptStore::receipt_count(self)
    }
}
