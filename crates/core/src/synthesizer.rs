use crate::traits::Generator;
use crate::{ApiKey, Chunk, QaError};
use std::sync::Arc;
use tracing::debug;

const INSTRUCTIONS: &str = "Use the following pieces of context to answer the question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Rough token count used to check a prompt against the provider limit.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Stuffs every chunk verbatim, in retrieval order, after the question.
pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{INSTRUCTIONS}\n\nQuestion: {question}\n\nContext:\n{context}\n\nHelpful Answer:")
}

#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Never truncates: an oversized prompt fails with `ContextTooLarge` and
    /// the caller is expected to lower k or the chunk size.
    pub async fn synthesize(
        &self,
        credential: &ApiKey,
        question: &str,
        chunks: &[Chunk],
        temperature: f32,
    ) -> Result<String, QaError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(QaError::InvalidRequest(format!(
                "temperature {temperature} is outside [0, 1]"
            )));
        }

        let prompt = build_prompt(question, chunks);
        let prompt_tokens = estimate_tokens(&prompt);
        let limit = self.generator.max_prompt_tokens();
        if prompt_tokens > limit {
            return Err(QaError::ContextTooLarge(format!(
                "prompt needs about {prompt_tokens} tokens but the provider accepts {limit}"
            )));
        }

        debug!(chunks = chunks.len(), prompt_tokens, "synthesizing answer");
        self.generator.generate(credential, &prompt, temperature).await
    }
}
