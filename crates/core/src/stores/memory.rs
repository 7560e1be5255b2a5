use crate::traits::VectorIndex;
use crate::{Chunk, EmbeddingVector, IndexEntry, QaError, RetrievalResult, RetrievedChunk};
use async_trait::async_trait;

/// Brute-force cosine index rebuilt for every request. Entries keep
/// insertion order and are never mutated after `build`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
}

impl InMemoryIndex {
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self, QaError> {
        let dimensions = entries.first().map(|entry| entry.vector.len());

        if let Some(expected) = dimensions {
            if let Some(entry) = entries.iter().find(|entry| entry.vector.len() != expected) {
                return Err(QaError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
        }

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn from_chunks(chunks: Vec<Chunk>, vectors: Vec<EmbeddingVector>) -> Result<Self, QaError> {
        if chunks.len() != vectors.len() {
            return Err(QaError::InvalidRequest(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        Self::build(entries)
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<RetrievalResult, QaError> {
        let Some(expected) = self.dimensions else {
            return Err(QaError::EmptyIndex);
        };
        if k == 0 {
            return Err(QaError::InvalidRequest("k must be at least 1".to_string()));
        }
        if query_vector.len() != expected {
            return Err(QaError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query_vector, &entry.vector)))
            .collect();

        // sort_by is stable, so equal scores stay in insertion order
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored.truncate(k);

        Ok(RetrievalResult {
            hits: scored
                .into_iter()
                .map(|(position, score)| RetrievedChunk {
                    chunk: self.entries[position].chunk.clone(),
                    score,
                })
                .collect(),
        })
    }
}

/// Returns 0.0 when either vector has zero magnitude. Never returns -0.0, so
/// orthogonal and zero vectors rank as equal.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_finite() && score != 0.0 {
        score
    } else {
        0.0
    }
}
