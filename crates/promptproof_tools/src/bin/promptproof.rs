#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal, Read};

use promptproof_engine::device_vault::DeviceVault;
use promptproof_tools::vault_cli::{execute_vault_command, VaultCommand, VAULT_USAGE};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args[0] != "vault" {
        return Err(VAULT_USAGE.to_string());
    }
    let subcommand = args.get(1).ok_or_else(|| VAULT_USAGE.to_string())?;
    let key_id = args.get(2).map(String::as_str);

    let command = VaultCommand::parse(subcommand, key_id)?;
    let secret_value = match &command {
        VaultCommand::Set { key } => Some(read_secret_value(key.as_str())?),
        _ => None,
    };

    let vault = DeviceVault::default_local();
    let output = execute_vault_command(&vault, &command, secret_value.as_deref())?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn read_secret_value(key_id: &str) -> Result<String, String> {
    let raw = if io::stdin().is_terminal() {
        rpassword::prompt_password(format!("Enter value for {key_id}:"))
            .map_err(|e| e.to_string())?
    } else {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| e.to_string())?;
        input
    };
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        return Err("secret value must not be empty".to_string());
    }
    Ok(trimmed)
}
