use crate::{ApiKey, EmbeddingVector, QaError, RetrievalResult};
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// One vector per input, in input order. An empty batch makes no call.
    async fn embed(
        &self,
        credential: &ApiKey,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, QaError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Largest prompt, in estimated tokens, the provider accepts.
    fn max_prompt_tokens(&self) -> usize;

    async fn generate(
        &self,
        credential: &ApiKey,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, QaError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<RetrievalResult, QaError>;
}
