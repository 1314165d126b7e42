#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use promptproof_contracts::{ReceiptDocument, ReceiptId};
use promptproof_engine::CompletionEngine;
use promptproof_service::{GenerateError, GenerationService};
use promptproof_storage::ReceiptStore;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerateAdapterRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterErrorResponse {
    pub error: String,
}

/// Boundary failure kinds: everything the transport layer needs to pick a
/// status code. Service-layer errors are translated here and never cross
/// the HTTP boundary raw.
#[derive(Debug)]
pub enum AdapterFailure {
    NotFound(String),
    Internal(String),
}

impl AdapterFailure {
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) | Self::Internal(msg) => msg,
        }
    }
}

pub struct AdapterRuntime {
    service: GenerationService<ReceiptStore>,
}

impl AdapterRuntime {
    pub fn new(service: GenerationService<ReceiptStore>) -> Self {
        Self { service }
    }

    pub fn default_from_env() -> Result<Self, String> {
        let engine = CompletionEngine::from_env();
        let store_path = env::var("PROMPTPROOF_STORE_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);
        let store = ReceiptStore::new_with_persistence(store_path).map_err(|err| err.to_string())?;
        Ok(Self::new(GenerationService::new(engine, store)))
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
        }
    }

    pub fn handle_generate(
        &mut self,
        request: GenerateAdapterRequest,
    ) -> Result<ReceiptDocument, AdapterFailure> {
        self.service
            .generate(&request.prompt)
            .map(|receipt| receipt.to_document())
            .map_err(adapter_failure_from_service)
    }

    pub fn handle_get_receipt(&self, receipt_id: u64) -> Result<ReceiptDocument, AdapterFailure> {
        self.service
            .get_receipt(ReceiptId(receipt_id))
            .map(|receipt| receipt.to_document())
            .map_err(adapter_failure_from_service)
    }
}

fn adapter_failure_from_service(err: GenerateError) -> AdapterFailure {
    match err {
        GenerateError::NotFound(_) => AdapterFailure::NotFound(err.safe_detail()),
        GenerateError::Configuration(_)
        | GenerateError::Backend(_)
        | GenerateError::Persistence(_) => AdapterFailure::Internal(err.safe_detail()),
    }
}

fn default_store_path() -> PathBuf {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home)
            .join("promptproof")
            .join("receipts.jsonl");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("promptproof")
            .join("receipts.jsonl");
    }
    PathBuf::from(".promptproof").join("receipts.jsonl")
}
