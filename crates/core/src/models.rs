use crate::error::QaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

pub type EmbeddingVector = Vec<f32>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub name: String,
    pub content: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());

        Self {
            name: name.into(),
            checksum: format!("{:x}", hasher.finalize()),
            content,
            ingested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    /// Position of the chunk in the chunk sequence of the corpus.
    pub index: usize,
    /// Byte offset of the chunk's first character in the corpus.
    pub offset: usize,
    pub text: String,
    /// Names of the documents whose content this chunk overlaps.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: EmbeddingVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub question: String,
    pub temperature: f32,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Hits ordered by descending score, earliest insertion first on ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.hits.iter().map(|hit| hit.chunk.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub request_id: Uuid,
    pub text: String,
    pub context: RetrievalResult,
}

/// Provider credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(raw: &str, required_prefix: &str) -> Result<Self, QaError> {
        if raw.is_empty() {
            return Err(QaError::InvalidRequest("credential is empty".to_string()));
        }
        if !raw.starts_with(required_prefix) {
            return Err(QaError::InvalidRequest(format!(
                "credential must start with '{required_prefix}'"
            )));
        }
        if raw.len() == required_prefix.len() {
            return Err(QaError::InvalidRequest(
                "credential has nothing after its prefix".to_string(),
            ));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(QaError::InvalidRequest(
                "credential contains whitespace".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
