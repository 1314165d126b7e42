#![forbid(unsafe_code)]

pub mod completion;
pub mod device_vault;

pub use completion::{CompletionConfig, CompletionEngine, CompletionError, ProviderCallError};
