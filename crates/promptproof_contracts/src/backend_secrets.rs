#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendSecretId {
    OpenAiApiKey,
}

impl BackendSecretId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiApiKey => "openai_api_key",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::OpenAiApiKey]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "openai_api_key" => Some(Self::OpenAiApiKey),
            _ => None,
        }
    }

    pub fn allowed_key_names() -> Vec<&'static str> {
        Self::all().iter().map(|id| id.as_str()).collect()
    }
}
