use crate::traits::{Embedder, VectorIndex};
use crate::{ApiKey, QaError, RetrievalResult};
use tracing::debug;

/// Fixed top-k policy over any [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retriever {
    k: usize,
}

impl Retriever {
    pub fn new(k: usize) -> Result<Self, QaError> {
        if k == 0 {
            return Err(QaError::InvalidRequest("k must be at least 1".to_string()));
        }
        Ok(Self { k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// The query must go through the same embedder that produced the index.
    pub async fn retrieve(
        &self,
        index: &dyn VectorIndex,
        query: &str,
        embedder: &dyn Embedder,
        credential: &ApiKey,
    ) -> Result<RetrievalResult, QaError> {
        if index.is_empty() {
            return Err(QaError::EmptyIndex);
        }

        let mut vectors = embedder.embed(credential, &[query.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(QaError::unavailable(
                "embedder",
                format!("returned {} vectors for one query", vectors.len()),
            ));
        }
        let query_vector = vectors.remove(0);

        let result = index.search(&query_vector, self.k).await?;
        debug!(k = self.k, hits = result.len(), "retrieved context");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::Retriever;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ErrorKind;
    use crate::stores::InMemoryIndex;
    use crate::{ApiKey, Chunk};

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("chunk-{index}"),
            index,
            offset: 0,
            text: text.to_string(),
            sources: Vec::new(),
        }
    }

    #[tokio::test]
    async fn retrieves_the_closest_chunk() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = ["The sky is blue.", "Pumps move hydraulic fluid."];
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(position, text)| chunk(position, text))
            .collect();
        let vectors = texts.iter().map(|text| embedder.embed_text(text)).collect();
        let index = InMemoryIndex::from_chunks(chunks, vectors).unwrap();
        let credential = ApiKey::parse("sk-local", "sk-").unwrap();

        let result = Retriever::new(1)
            .unwrap()
            .retrieve(&index, "What color is the sky?", &embedder, &credential)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].chunk.text, "The sky is blue.");
    }

    #[tokio::test]
    async fn empty_index_fails_before_embedding() {
        let index = InMemoryIndex::build(Vec::new()).unwrap();
        let credential = ApiKey::parse("sk-local", "sk-").unwrap();
        let error = Retriever::new(3)
            .unwrap()
            .retrieve(&index, "anything", &CharacterNgramEmbedder::default(), &credential)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::EmptyIndex);
    }

    #[test]
    fn zero_k_is_rejected() {
        assert_eq!(Retriever::new(0).unwrap_err().kind(), ErrorKind::InvalidRequest);
    }
}
