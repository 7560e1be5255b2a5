use crate::error::QaError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SEPARATOR: &str = "\n";
pub const DEFAULT_CREDENTIAL_PREFIX: &str = "sk-";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1_536;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 1_000;
const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
const DEFAULT_MAX_TOKENS: usize = 256;
const DEFAULT_CONTEXT_WINDOW_TOKENS: usize = 4_096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temperature: f32,
    pub k: usize,
    pub separator: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            temperature: DEFAULT_TEMPERATURE,
            k: DEFAULT_TOP_K,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), QaError> {
        if self.chunk_size == 0 {
            return Err(QaError::InvalidRequest(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.k == 0 {
            return Err(QaError::InvalidRequest("k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(QaError::InvalidRequest(format!(
                "temperature {} is outside [0, 1]",
                self.temperature
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(QaError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(QaError::Configuration("separator must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Connection settings for an OpenAI-compatible provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_base: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_batch_size: usize,
    pub completion_model: String,
    pub max_tokens: usize,
    pub context_window_tokens: usize,
    pub timeout: Option<Duration>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            context_window_tokens: DEFAULT_CONTEXT_WINDOW_TOKENS,
            timeout: None,
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Result<Self, QaError> {
        let mut settings = Self::default();

        if let Some(base) = non_blank_env("OPENAI_API_BASE") {
            settings = settings.with_api_base(&base)?;
        }
        if let Some(model) = non_blank_env("DOC_QA_EMBEDDING_MODEL") {
            settings.embedding_model = model;
        }
        if let Some(model) = non_blank_env("DOC_QA_COMPLETION_MODEL") {
            settings.completion_model = model;
        }
        if let Some(raw) = non_blank_env("DOC_QA_TIMEOUT_SECS") {
            let seconds = raw.parse::<u64>().map_err(|error| {
                QaError::Configuration(format!("DOC_QA_TIMEOUT_SECS={raw}: {error}"))
            })?;
            settings.timeout = Some(Duration::from_secs(seconds));
        }

        Ok(settings)
    }

    /// Sets the API base. A trailing slash is added so relative endpoint
    /// paths join underneath it.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, QaError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Url::parse(&normalized)
            .map_err(|error| QaError::Configuration(format!("api base {base}: {error}")))?;
        self.api_base = normalized;
        Ok(self)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, QaError> {
        Url::parse(&self.api_base)
            .and_then(|base| base.join(path))
            .map_err(|error| QaError::Configuration(format!("api base {}: {error}", self.api_base)))
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
