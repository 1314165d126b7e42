#![forbid(unsafe_code)]

pub mod backend_secrets;
pub mod common;
pub mod receipt;

pub use backend_secrets::BackendSecretId;
pub use common::{ContractViolation, SchemaVersion, Validate};
pub use receipt::{receipt_digest, Receipt, ReceiptContent, ReceiptDocument, ReceiptId};
