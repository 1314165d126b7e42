#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use promptproof_contracts::receipt_digest;
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 5] = ["timestamp", "model", "prompt", "response", "hash"];

/// Outcome of one offline verification pass. `Malformed` covers everything
/// that prevents the digest comparison from running; `Tampered` means the
/// comparison ran and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid {
        timestamp: String,
        model: String,
        hash: String,
    },
    Tampered {
        expected_hash: String,
        computed_hash: String,
    },
    Malformed {
        reason: String,
    },
}

impl VerifyOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Valid { .. } => 0,
            Self::Tampered { .. } | Self::Malformed { .. } => 1,
        }
    }

    pub fn render_report(&self) -> String {
        match self {
            Self::Valid {
                timestamp,
                model,
                hash,
            } => format!(
                "receipt is valid\n  timestamp: {timestamp}\n  model: {model}\n  hash: {hash}"
            ),
            Self::Tampered {
                expected_hash,
                computed_hash,
            } => format!(
                "receipt is tampered\n  expected hash: {expected_hash}\n  computed hash: {computed_hash}"
            ),
            Self::Malformed { reason } => format!("receipt is malformed: {reason}"),
        }
    }
}

/// Recomputes the digest of a receipt document and compares it against the
/// stored hash. Validation order: readable file, parseable JSON, required
/// string fields present, then the digest comparison.
pub fn verify_receipt_file(path: &Path) -> VerifyOutcome {
    if !path.exists() {
        return VerifyOutcome::Malformed {
            reason: format!("file '{}' not found", path.display()),
        };
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            return VerifyOutcome::Malformed {
                reason: format!("failed to read '{}': {}", path.display(), err),
            }
        }
    };
    let document: Value = match serde_json::from_str(&raw) {
        Ok(document) => document,
        Err(err) => {
            return VerifyOutcome::Malformed {
                reason: format!("invalid JSON: {err}"),
            }
        }
    };
    verify_receipt_document(&document)
}

pub fn verify_receipt_document(document: &Value) -> VerifyOutcome {
    let Some(object) = document.as_object() else {
        return VerifyOutcome::Malformed {
            reason: "document must be a JSON object".to_string(),
        };
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return VerifyOutcome::Malformed {
            reason: format!("missing required fields: {}", missing.join(", ")),
        };
    }

    for field in REQUIRED_FIELDS {
        if !object[field].is_string() {
            return VerifyOutcome::Malformed {
                reason: format!("field '{field}' must be a string"),
            };
        }
    }

    let field = |name: &str| object[name].as_str().unwrap_or_default();
    let computed_hash = receipt_digest(
        field("timestamp"),
        field("model"),
        field("prompt"),
        field("response"),
    );
    let stored_hash = field("hash");

    // Case-sensitive: the format mandates lowercase hex.
    if computed_hash == stored_hash {
        VerifyOutcome::Valid {
            timestamp: field("timestamp").to_string(),
            model: field("model").to_string(),
            hash: computed_hash,
        }
    } else {
        VerifyOutcome::Tampered {
            expected_hash: stored_hash.to_string(),
            computed_hash,
        }
    }
}
