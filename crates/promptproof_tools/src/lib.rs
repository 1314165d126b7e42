#![forbid(unsafe_code)]

pub mod vault_cli;
pub mod verify;

pub use verify::{verify_receipt_file, VerifyOutcome};
