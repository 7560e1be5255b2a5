use crate::traits::Embedder;
use crate::{ApiKey, EmbeddingVector, QaError};
use async_trait::async_trait;

pub const DEFAULT_LOCAL_DIMENSIONS: usize = 256;

/// Offline embedder hashing character trigrams into buckets. Ignores the credential.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_LOCAL_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        if chars.len() < 3 {
            let bucket = bucket_for(&lowered, vector.len());
            vector[bucket] = 1.0;
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let bucket = bucket_for(&token, vector.len());
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

fn bucket_for(token: &str, buckets: usize) -> usize {
    // FNV-1a
    let mut hash = 1469598103934665603u64;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash % buckets as u64) as usize
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(
        &self,
        _credential: &ApiKey,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, QaError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
