#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const RECEIPT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Store-assigned identifier; monotonically increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiptId(pub u64);

impl Validate for ReceiptId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "receipt_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// The four content fields bound together by the digest. Any string is
/// acceptable, including empty; the prompt and response are stored exactly
/// as received, unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptContent {
    pub timestamp: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
}

impl ReceiptContent {
    pub fn v1(timestamp: String, model: String, prompt: String, response: String) -> Self {
        Self {
            timestamp,
            model,
            prompt,
            response,
        }
    }

    pub fn digest(&self) -> String {
        receipt_digest(&self.timestamp, &self.model, &self.prompt, &self.response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub schema_version: SchemaVersion,
    pub receipt_id: ReceiptId,
    pub content: ReceiptContent,
    pub hash: String,
}

impl Receipt {
    pub fn v1(
        receipt_id: ReceiptId,
        content: ReceiptContent,
        hash: String,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: RECEIPT_CONTRACT_VERSION,
            receipt_id,
            content,
            hash,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn to_document(&self) -> ReceiptDocument {
        ReceiptDocument {
            id: Some(self.receipt_id.0),
            timestamp: self.content.timestamp.clone(),
            model: self.content.model.clone(),
            prompt: self.content.prompt.clone(),
            response: self.content.response.clone(),
            hash: self.hash.clone(),
        }
    }

    pub fn from_document(doc: ReceiptDocument) -> Result<Self, ContractViolation> {
        let id = doc.id.ok_or(ContractViolation::InvalidValue {
            field: "receipt_document.id",
            reason: "must be present for a persisted receipt",
        })?;
        Self::v1(
            ReceiptId(id),
            ReceiptContent::v1(doc.timestamp, doc.model, doc.prompt, doc.response),
            doc.hash,
        )
    }
}

impl Validate for Receipt {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.receipt_id.validate()?;
        if self.hash.len() != 64 {
            return Err(ContractViolation::InvalidValue {
                field: "receipt.hash",
                reason: "must be 64 hex chars",
            });
        }
        if !self
            .hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(ContractViolation::InvalidValue {
                field: "receipt.hash",
                reason: "must be lowercase hex",
            });
        }
        Ok(())
    }
}

/// The flat wire shape shared by the HTTP surface, the store journal, and
/// the offline verifier. `id` is optional and ignored by verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub timestamp: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub hash: String,
}

/// SHA-256 over the plain concatenation `timestamp + model + prompt +
/// response`. No delimiter and no length prefix: different field splits of
/// the same byte string collide. This is a known limitation of the receipt
/// format; changing the assembly would invalidate every stored receipt, so
/// both the service and the verifier must go through this function.
pub fn receipt_digest(timestamp: &str, model: &str, prompt: &str, response: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(model.as_bytes());
    hasher.update(prompt.as_bytes());
    hasher.update(response.as_bytes());
    hex_lower(&hasher.finalize())
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_lowercase_hex() {
        let a = receipt_digest("t", "m", "p", "r");
        let b = receipt_digest("t", "m", "p", "r");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a
            .bytes()
            .all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c)));
    }

    #[test]
    fn digest_accepts_empty_fields() {
        // SHA-256 of the empty string.
        assert_eq!(
            receipt_digest("", "", "", ""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_matches_known_scenario() {
        // SHA-256 of "2025-01-01T00:00:00Z" + "gpt-4o-mini" + "2+2?" + "4".
        assert_eq!(
            receipt_digest("2025-01-01T00:00:00Z", "gpt-4o-mini", "2+2?", "4"),
            "14e6cc6ff93ff140f6329767b0e898e564e61600942d42176c513bc93289b174"
        );
    }

    #[test]
    fn digest_field_boundaries_are_ambiguous() {
        // "ab"+"c" and "a"+"bc" concatenate to the same bytes.
        assert_eq!(
            receipt_digest("ab", "c", "", ""),
            receipt_digest("a", "bc", "", "")
        );
    }

    #[test]
    fn receipt_rejects_malformed_hash() {
        let content = ReceiptContent::v1(
            "2025-01-01T00:00:00Z".to_string(),
            "gpt-4o-mini".to_string(),
            "2+2?".to_string(),
            "4".to_string(),
        );
        let err = Receipt::v1(ReceiptId(1), content.clone(), "deadbeef".to_string())
            .expect_err("short hash must fail");
        assert!(matches!(err, ContractViolation::InvalidValue { field, .. }
            if field == "receipt.hash"));

        let upper = content.digest().to_ascii_uppercase();
        let err = Receipt::v1(ReceiptId(1), content, upper).expect_err("uppercase must fail");
        assert!(matches!(err, ContractViolation::InvalidValue { field, .. }
            if field == "receipt.hash"));
    }

    #[test]
    fn receipt_rejects_zero_id() {
        let content = ReceiptContent::v1(
            "t".to_string(),
            "m".to_string(),
            "p".to_string(),
            "r".to_string(),
        );
        let hash = content.digest();
        let err = Receipt::v1(ReceiptId(0), content, hash).expect_err("zero id must fail");
        assert!(matches!(err, ContractViolation::InvalidValue { field, .. }
            if field == "receipt_id"));
    }

    #[test]
    fn document_roundtrip_preserves_all_fields() {
        let content = ReceiptContent::v1(
            "2025-01-01T00:00:00Z".to_string(),
            "gpt-4o-mini".to_string(),
            "2+2?".to_string(),
            "4".to_string(),
        );
        let hash = content.digest();
        let receipt = Receipt::v1(ReceiptId(7), content, hash).unwrap();
        let doc = receipt.to_document();
        assert_eq!(doc.id, Some(7));
        let back = Receipt::from_document(doc).unwrap();
        assert_eq!(back, receipt);
    }

    #[test]
    fn document_without_id_is_not_a_persisted_receipt() {
        let doc = ReceiptDocument {
            id: None,
            timestamp: "t".to_string(),
            model: "m".to_string(),
            prompt: "p".to_string(),
            response: "r".to_string(),
            hash: receipt_digest("t", "m", "p", "r"),
        };
        assert!(Receipt::from_document(doc).is_err());
    }
}
