#![forbid(unsafe_code)]

use promptproof_contracts::backend_secrets::BackendSecretId;
use promptproof_engine::device_vault::DeviceVault;

pub const VAULT_USAGE: &str = "usage: promptproof vault <set|has|del|ls> [key_id]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCommand {
    Set { key: BackendSecretId },
    Has { key: BackendSecretId },
    Del { key: BackendSecretId },
    Ls,
}

impl VaultCommand {
    /// Parses `vault <subcommand> [key_id]` argument tails. The secret value
    /// itself never travels through argv.
    pub fn parse(subcommand: &str, key_id: Option<&str>) -> Result<Self, String> {
        match subcommand {
            "set" => Ok(Self::Set {
                key: require_key_id(key_id)?,
            }),
            "has" => Ok(Self::Has {
                key: require_key_id(key_id)?,
            }),
            "del" => Ok(Self::Del {
                key: require_key_id(key_id)?,
            }),
            "ls" => Ok(Self::Ls),
            other => Err(format!(
                "unknown vault subcommand: {other}. expected one of: set, has, del, ls"
            )),
        }
    }
}

pub fn execute_vault_command(
    vault: &DeviceVault,
    command: &VaultCommand,
    secret_value: Option<&str>,
) -> Result<String, String> {
    match command {
        VaultCommand::Set { key } => {
            let raw = secret_value.ok_or_else(|| "missing secret input value".to_string())?;
            vault
                .set_secret(key.as_str(), raw)
                .map_err(|e| format!("failed to store key: {e}"))?;
            Ok("OK".to_string())
        }
        VaultCommand::Has { key } => {
            let has = vault
                .has_secret(key.as_str())
                .map_err(|e| format!("failed to check key: {e}"))?;
            Ok(if has { "YES" } else { "NO" }.to_string())
        }
        VaultCommand::Del { key } => {
            vault
                .delete_secret(key.as_str())
                .map_err(|e| format!("failed to delete key: {e}"))?;
            Ok("OK".to_string())
        }
        VaultCommand::Ls => {
            let keys = vault
                .list_secret_ids()
                .map_err(|e| format!("failed to list keys: {e}"))?;
            Ok(keys.join("\n"))
        }
    }
}

fn require_key_id(raw: Option<&str>) -> Result<BackendSecretId, String> {
    let allowed = || BackendSecretId::allowed_key_names().join(", ");
    let raw = raw.ok_or_else(|| format!("missing key id. allowed: {}", allowed()))?;
    BackendSecretId::parse(raw)
        .ok_or_else(|| format!("unknown key id '{raw}'. allowed: {}", allowed()))
}

#[cfg(test)]
mod tests {
    use super::{execute_vault_command, VaultCommand};
    use promptproof_contracts::backend_secrets::BackendSecretId;
    use promptproof_engine::device_vault::DeviceVault;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_vault() -> (PathBuf, DeviceVault) {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        let base = std::env::temp_dir().join(format!("promptproof-vault-cli-test-{suffix}"));
        fs::create_dir_all(&base).unwrap();
        let vault = DeviceVault::for_paths(base.join("vault.json"), base.join("vault.master.key"));
        (base, vault)
    }

    fn cmd(subcommand: &str) -> VaultCommand {
        VaultCommand::parse(subcommand, Some("openai_api_key")).unwrap()
    }

    #[test]
    fn set_has_del_roundtrip() {
        let (base, vault) = temp_vault();
        assert_eq!(
            execute_vault_command(&vault, &cmd("set"), Some("sk-demo")).unwrap(),
            "OK"
        );
        assert_eq!(
            execute_vault_command(&vault, &cmd("has"), None).unwrap(),
            "YES"
        );
        assert_eq!(
            execute_vault_command(&vault, &cmd("del"), None).unwrap(),
            "OK"
        );
        assert_eq!(
            execute_vault_command(&vault, &cmd("has"), None).unwrap(),
            "NO"
        );
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn output_never_contains_secret_value() {
        let (base, vault) = temp_vault();
        let sentinel = "DO_NOT_LEAK_SENTINEL";
        let out = execute_vault_command(&vault, &cmd("set"), Some(sentinel)).unwrap();
        assert!(!out.contains(sentinel));
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn parse_rejects_unknown_subcommand_and_key() {
        let err = VaultCommand::parse("rotate", Some("openai_api_key"))
            .expect_err("unknown subcommand must fail");
        assert!(err.contains("unknown vault subcommand"));

        let err = VaultCommand::parse("set", Some("brave_search_api_key"))
            .expect_err("unknown key must fail");
        assert!(err.contains("unknown key id"));

        let err = VaultCommand::parse("has", None).expect_err("missing key must fail");
        assert!(err.contains("missing key id"));
    }

    #[test]
    fn ls_lists_only_known_key_ids() {
        let (base, vault) = temp_vault();
        execute_vault_command(&vault, &cmd("set"), Some("sk-demo")).unwrap();
        let out = execute_vault_command(&vault, &VaultCommand::Ls, None).unwrap();
        assert_eq!(out, BackendSecretId::OpenAiApiKey.as_str());
        fs::remove_dir_all(base).unwrap();
    }
}
