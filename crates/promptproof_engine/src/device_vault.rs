#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use promptproof_contracts::backend_secrets::BackendSecretId;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const VAULT_SCHEMA_VERSION: u8 = 1;
const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub enum VaultError {
    UnknownKeyId(String),
    EmptySecretValue,
    Io(std::io::Error),
    Corrupt(&'static str),
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKeyId(key) => write!(f, "unknown key id: {key}"),
            Self::EmptySecretValue => write!(f, "secret value must not be empty"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Corrupt(what) => write!(f, "vault data corrupt: {what}"),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<std::io::Error> for VaultError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct VaultFile {
    schema_version: u8,
    entries: BTreeMap<String, EncryptedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncryptedEntry {
    nonce: String,
    secret: String,
    updated_at_unix_ms: u64,
}

/// Encrypted at-rest storage for the backend credential: one JSON file with
/// an AES-256-GCM ciphertext per key id, and a sibling master-key file kept
/// at mode 0o600. The credential never touches the process environment or
/// shell history when stored this way.
#[derive(Debug, Clone)]
pub struct DeviceVault {
    vault_path: PathBuf,
    key_path: PathBuf,
}

impl DeviceVault {
    pub fn default_local() -> Self {
        let vault_path = env::var("PROMPTPROOF_VAULT_PATH")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(default_vault_path);
        let mut key_path = vault_path.clone();
        key_path.set_extension("master.key");
        Self::for_paths(vault_path, key_path)
    }

    pub fn for_paths(vault_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            vault_path,
            key_path,
        }
    }

    pub fn set_secret(&self, key_id: &str, value: &str) -> Result<(), VaultError> {
        known_key_id(key_id)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VaultError::EmptySecretValue);
        }

        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), trimmed.as_bytes())
            .map_err(|_| VaultError::Corrupt("encrypt failed"))?;

        let mut entries = self.load_entries()?;
        entries.insert(
            key_id.to_string(),
            EncryptedEntry {
                nonce: BASE64.encode(nonce_bytes),
                secret: BASE64.encode(ciphertext),
                updated_at_unix_ms: now_unix_ms(),
            },
        );
        self.store_entries(entries)
    }

    pub fn resolve_secret(&self, key_id: &str) -> Result<Option<String>, VaultError> {
        known_key_id(key_id)?;
        let entries = self.load_entries()?;
        let Some(entry) = entries.get(key_id) else {
            return Ok(None);
        };

        let nonce_bytes = decode_b64(&entry.nonce, "nonce")?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(VaultError::Corrupt("nonce length"));
        }
        let ciphertext = decode_b64(&entry.secret, "ciphertext")?;
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| VaultError::Corrupt("decrypt failed"))?;
        let secret =
            String::from_utf8(plaintext).map_err(|_| VaultError::Corrupt("secret encoding"))?;
        if secret.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(secret))
    }

    pub fn has_secret(&self, key_id: &str) -> Result<bool, VaultError> {
        Ok(self.resolve_secret(key_id)?.is_some())
    }

    pub fn delete_secret(&self, key_id: &str) -> Result<bool, VaultError> {
        known_key_id(key_id)?;
        let mut entries = self.load_entries()?;
        let removed = entries.remove(key_id).is_some();
        if removed {
            self.store_entries(entries)?;
        }
        Ok(removed)
    }

    pub fn list_secret_ids(&self) -> Result<Vec<String>, VaultError> {
        let entries = self.load_entries()?;
        Ok(entries
            .keys()
            .filter(|key| BackendSecretId::parse(key).is_some())
            .cloned()
            .collect())
    }

    fn load_entries(&self) -> Result<BTreeMap<String, EncryptedEntry>, VaultError> {
        if !self.vault_path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.vault_path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let file: VaultFile =
            serde_json::from_str(&raw).map_err(|_| VaultError::Corrupt("vault document"))?;
        if file.schema_version != VAULT_SCHEMA_VERSION {
            return Err(VaultError::Corrupt("schema_version"));
        }
        Ok(file.entries)
    }

    fn store_entries(&self, entries: BTreeMap<String, EncryptedEntry>) -> Result<(), VaultError> {
        self.ensure_parent_dirs()?;
        let file = VaultFile {
            schema_version: VAULT_SCHEMA_VERSION,
            entries,
        };
        let serialized = serde_json::to_vec_pretty(&file)
            .map_err(|_| VaultError::Corrupt("vault document"))?;
        atomic_write(&self.vault_path, &serialized)
    }

    fn cipher(&self) -> Result<Aes256Gcm, VaultError> {
        let key = self.load_or_create_master_key()?;
        Aes256Gcm::new_from_slice(&key).map_err(|_| VaultError::Corrupt("master key"))
    }

    fn load_or_create_master_key(&self) -> Result<[u8; MASTER_KEY_LEN], VaultError> {
        if self.key_path.exists() {
            let encoded = fs::read_to_string(&self.key_path)?;
            let decoded = decode_b64(encoded.trim(), "master key")?;
            let key: [u8; MASTER_KEY_LEN] = decoded
                .try_into()
                .map_err(|_| VaultError::Corrupt("master key length"))?;
            return Ok(key);
        }

        self.ensure_parent_dirs()?;
        let mut key = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_new_file_restricted(&self.key_path, BASE64.encode(key).as_bytes())?;
        Ok(key)
    }

    fn ensure_parent_dirs(&self) -> Result<(), VaultError> {
        for path in [&self.vault_path, &self.key_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Convenience lookup against the default local vault.
pub fn resolve_secret(key_id: &str) -> Result<Option<String>, VaultError> {
    DeviceVault::default_local().resolve_secret(key_id)
}

fn known_key_id(raw: &str) -> Result<BackendSecretId, VaultError> {
    BackendSecretId::parse(raw).ok_or_else(|| VaultError::UnknownKeyId(raw.to_string()))
}

fn decode_b64(raw: &str, what: &'static str) -> Result<Vec<u8>, VaultError> {
    BASE64
        .decode(raw.as_bytes())
        .map_err(|_| VaultError::Corrupt(what))
}

fn default_vault_path() -> PathBuf {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config_home)
            .join("promptproof")
            .join("device_vault.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("promptproof")
            .join("device_vault.json");
    }
    PathBuf::from(".promptproof").join("device_vault.json")
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}

fn write_new_file_restricted(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(data)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
