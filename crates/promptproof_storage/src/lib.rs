#![forbid(unsafe_code)]

pub mod receipts;
pub mod repo;

pub use receipts::{ReceiptStore, StorageError};
pub use repo::ReceiptRepo;
