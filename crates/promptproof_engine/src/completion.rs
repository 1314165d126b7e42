#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use serde_json::Value;

use crate::device_vault;
use promptproof_contracts::backend_secrets::BackendSecretId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallError {
    pub provider: &'static str,
    pub http_status: Option<u16>,
    pub error_kind: &'static str,
}

impl ProviderCallError {
    pub fn new(provider: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            provider,
            http_status,
            error_kind,
        }
    }

    /// Loggable one-liner that never carries response bodies or credentials.
    pub fn safe_detail(&self) -> String {
        match self.http_status {
            Some(status) => format!(
                "provider={} error={} status={}",
                self.provider, self.error_kind, status
            ),
            None => format!("provider={} error={}", self.provider, self.error_kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// No backend credential available; detected before any network call.
    MissingConfig,
    Provider(ProviderCallError),
}

impl CompletionError {
    pub fn safe_detail(&self) -> String {
        match self {
            Self::MissingConfig => "backend credential not configured".to_string(),
            Self::Provider(err) => err.safe_detail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub chat_completions_url: String,
    pub model: String,
    pub timeout_ms: u32,
    pub user_agent: String,
    pub api_key: Option<String>,
    pub completion_fixture_json: Option<String>,
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        Self {
            chat_completions_url: env::var("OPENAI_CHAT_COMPLETIONS_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            // The model is service-side configuration; clients never pick it.
            model: env::var("PROMPTPROOF_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_ms: env::var("PROMPTPROOF_HTTP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (100..=600_000).contains(v))
                .unwrap_or(30_000),
            user_agent: env::var("PROMPTPROOF_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "promptproof/1.0".to_string()),
            api_key: None,
            completion_fixture_json: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionEngine {
    config: CompletionConfig,
}

impl CompletionEngine {
    pub fn new(config: CompletionConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(CompletionConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Explicit config value wins, then the process environment, then the
    /// encrypted device vault.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .and_then(trim_non_empty)
            .or_else(|| env::var("OPENAI_API_KEY").ok().and_then(trim_non_empty))
            .or_else(|| {
                match device_vault::resolve_secret(BackendSecretId::OpenAiApiKey.as_str()) {
                    Ok(Some(secret)) => trim_non_empty(secret),
                    _ => None,
                }
            })
    }

    /// Single synchronous completion call: the prompt is the sole user
    /// message. One attempt, no retries; the caller is blocked for the
    /// duration of the backend call.
    pub fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = self
            .resolve_api_key()
            .ok_or(CompletionError::MissingConfig)?;

        let body: Value = if let Some(fixture) = self.config.completion_fixture_json.as_deref() {
            serde_json::from_str(fixture).map_err(|_| {
                CompletionError::Provider(ProviderCallError::new("openai", "json_parse", None))
            })?
        } else {
            let payload = serde_json::json!({
                "model": self.config.model,
                "messages": [
                    {"role": "user", "content": prompt}
                ],
            });
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| {
                    CompletionError::Provider(ProviderCallError::new(
                        "openai",
                        "config_invalid",
                        None,
                    ))
                })?;
            let response = agent
                .post(&self.config.chat_completions_url)
                .set("Content-Type", "application/json")
                .set("Authorization", &format!("Bearer {api_key}"))
                .set("Accept", "application/json")
                .send_json(payload)
                .map_err(|e| CompletionError::Provider(provider_error_from_ureq("openai", e)))?;
            serde_json::from_reader(response.into_reader()).map_err(|_| {
                CompletionError::Provider(ProviderCallError::new("openai", "json_parse", None))
            })?
        };

        extract_completion_text(&body).ok_or(CompletionError::Provider(ProviderCallError::new(
            "openai",
            "empty_completion",
            None,
        )))
    }
}

fn extract_completion_text(root: &Value) -> Option<String> {
    let content = root
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)?;
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}

fn build_http_agent(timeout_ms: u32, user_agent: &str) -> Result<ureq::Agent, String> {
    if timeout_ms == 0 {
        return Err("timeout must be > 0".to_string());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build())
}

fn provider_error_from_ureq(provider: &'static str, err: ureq::Error) -> ProviderCallError {
    match err {
        ureq::Error::Status(status, _) => {
            ProviderCallError::new(provider, "http_non_200", Some(status as u16))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            ProviderCallError::new(provider, classify_transport_error_kind(&combined), None)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

fn trim_non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
