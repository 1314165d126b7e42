#![forbid(unsafe_code)]

use chrono::{SecondsFormat, Utc};

use promptproof_contracts::{Receipt, ReceiptContent, ReceiptId};
use promptproof_engine::{CompletionEngine, CompletionError, ProviderCallError};
use promptproof_storage::{ReceiptRepo, StorageError};

#[derive(Debug)]
pub enum GenerateError {
    /// Backend credential missing; detected before any outbound call.
    Configuration(String),
    /// The model call failed (network, auth, quota, malformed output).
    Backend(ProviderCallError),
    /// The receipt could not be inserted or journaled.
    Persistence(StorageError),
    /// Valid lookup, no such record.
    NotFound(ReceiptId),
}

impl GenerateError {
    pub fn safe_detail(&self) -> String {
        match self {
            Self::Configuration(detail) => detail.clone(),
            Self::Backend(err) => err.safe_detail(),
            Self::Persistence(err) => err.to_string(),
            Self::NotFound(id) => format!("receipt {} not found", id.0),
        }
    }
}

/// Orchestrates one generation turn: backend call, timestamp capture at
/// response receipt, digest, durable insert. The engine and store are
/// injected; the service owns no process-wide state.
#[derive(Debug)]
pub struct GenerationService<R: ReceiptRepo> {
    engine: CompletionEngine,
    store: R,
}

impl<R: ReceiptRepo> GenerationService<R> {
    pub fn new(engine: CompletionEngine, store: R) -> Self {
        Self { engine, store }
    }

    /// Single attempt, no retries: any failure is reported to the caller
    /// immediately.
    pub fn generate(&mut self, prompt: &str) -> Result<Receipt, GenerateError> {
        let response = self.engine.complete(prompt).map_err(|err| match err {
            CompletionError::MissingConfig => GenerateError::Configuration(err.safe_detail()),
            CompletionError::Provider(provider_err) => GenerateError::Backend(provider_err),
        })?;

        // The timestamp marks the moment the model response was received,
        // not request arrival.
        let timestamp = now_utc_rfc3339();
        let content = ReceiptContent::v1(
            timestamp,
            self.engine.model().to_string(),
            prompt.to_string(),
            response,
        );
        let hash = content.digest();
        self.store
            .insert_receipt_row(content, hash)
            .map_err(GenerateError::Persistence)
    }

    pub fn get_receipt(&self, receipt_id: ReceiptId) -> Result<Receipt, GenerateError> {
        self.store
            .receipt_row(receipt_id)
            .cloned()
            .ok_or(GenerateError::NotFound(receipt_id))
    }

    pub fn receipt_count(&self) -> usize {
        self.store.receipt_count()
    }
}

fn now_utc_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
