use crate::chunking::{ChunkingConfig, Corpus};
use crate::config::{PipelineConfig, ProviderSettings, DEFAULT_CREDENTIAL_PREFIX};
use crate::error::ErrorKind;
use crate::providers::{OpenAiClient, OpenAiEmbedder, OpenAiGenerator};
use crate::retriever::Retriever;
use crate::stores::InMemoryIndex;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{Embedder, Generator, VectorIndex};
use crate::{Answer, ApiKey, Document, QaError, QueryRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Init,
    Validating,
    Chunking,
    Embedding,
    Indexing,
    Retrieving,
    Synthesizing,
    Done,
}

impl Stage {
    const ALL: [Stage; 8] = [
        Stage::Init,
        Stage::Validating,
        Stage::Chunking,
        Stage::Embedding,
        Stage::Indexing,
        Stage::Retrieving,
        Stage::Synthesizing,
        Stage::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Validating => "validating",
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Indexing => "indexing",
            Stage::Retrieving => "retrieving",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed run: the untranslated component error plus the stage it came from.
#[derive(Debug, Error)]
#[error("{stage} stage failed ({}): {error}", .error.kind())]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: QaError,
}

impl PipelineFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Stage of the run in progress. Lives for one invocation only.
#[derive(Debug, Default)]
struct StageTracker(AtomicU8);

impl StageTracker {
    fn enter(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Relaxed);
        debug!(stage = %stage, "entering stage");
    }

    fn current(&self) -> Stage {
        let raw = self.0.load(Ordering::Relaxed) as usize;
        Stage::ALL.get(raw).copied().unwrap_or(Stage::Init)
    }
}

/// Documents, question and credential in; answer out. Keeps no state
/// between runs: every run builds and drops its own index.
#[derive(Clone)]
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    synthesizer: AnswerSynthesizer,
    credential_prefix: String,
}

impl Pipeline {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            synthesizer: AnswerSynthesizer::new(generator),
            credential_prefix: DEFAULT_CREDENTIAL_PREFIX.to_string(),
        }
    }

    pub fn openai(settings: ProviderSettings) -> Result<Self, QaError> {
        let client = OpenAiClient::new(settings)?;
        Ok(Self::new(
            Arc::new(OpenAiEmbedder::new(client.clone())),
            Arc::new(OpenAiGenerator::new(client)),
        ))
    }

    pub fn with_credential_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.credential_prefix = prefix.into();
        self
    }

    pub async fn run(
        &self,
        documents: &[Document],
        query: &str,
        credential: &str,
        config: &PipelineConfig,
    ) -> Result<Answer, PipelineFailure> {
        self.run_until(documents, query, credential, config, std::future::pending::<()>())
            .await
    }

    /// Like [`Pipeline::run`], but gives up with `Cancelled` as soon as
    /// `cancel` completes. Nothing outlives the run, so there is nothing to
    /// roll back.
    pub async fn run_until<C>(
        &self,
        documents: &[Document],
        query: &str,
        credential: &str,
        config: &PipelineConfig,
        cancel: C,
    ) -> Result<Answer, PipelineFailure>
    where
        C: Future<Output = ()> + Send,
    {
        let request_id = Uuid::new_v4();
        let tracker = StageTracker::default();

        let outcome = async {
            tokio::select! {
                biased;
                result = self.execute(request_id, &tracker, documents, query, credential, config) => result,
                () = cancel => Err(QaError::Cancelled),
            }
        }
        .instrument(info_span!("pipeline", %request_id))
        .await;

        outcome.map_err(|error| {
            let stage = tracker.current();
            warn!(%request_id, stage = %stage, kind = %error.kind(), error = %error, "pipeline failed");
            PipelineFailure { stage, error }
        })
    }

    async fn execute(
        &self,
        request_id: Uuid,
        tracker: &StageTracker,
        documents: &[Document],
        query: &str,
        credential: &str,
        config: &PipelineConfig,
    ) -> Result<Answer, QaError> {
        tracker.enter(Stage::Validating);
        if documents.is_empty() {
            return Err(QaError::InvalidRequest("no documents supplied".to_string()));
        }
        if query.trim().is_empty() {
            return Err(QaError::InvalidRequest("query is empty".to_string()));
        }
        let credential = ApiKey::parse(credential, &self.credential_prefix)?;
        config.validate()?;
        let request = QueryRequest {
            question: query.to_string(),
            temperature: config.temperature,
            k: config.k,
        };

        tracker.enter(Stage::Chunking);
        let corpus = Corpus::concatenate(documents);
        let chunks = corpus.split(&ChunkingConfig::from(config))?;
        info!(
            documents = documents.len(),
            corpus_len = corpus.text().len(),
            chunk_count = chunks.len(),
            "chunked corpus"
        );

        tracker.enter(Stage::Embedding);
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&credential, &texts).await?;
        if vectors.len() != chunks.len() {
            return Err(QaError::unavailable(
                "embedder",
                format!(
                    "returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            ));
        }

        tracker.enter(Stage::Indexing);
        let index = InMemoryIndex::from_chunks(chunks, vectors)?;
        info!(entries = index.len(), dimensions = ?index.dimensions(), "built index");

        tracker.enter(Stage::Retrieving);
        let retrieved = Retriever::new(request.k)?
            .retrieve(&index, &request.question, self.embedder.as_ref(), &credential)
            .await?;
        info!(hits = retrieved.len(), "retrieved context");

        tracker.enter(Stage::Synthesizing);
        let text = self
            .synthesizer
            .synthesize(
                &credential,
                &request.question,
                &retrieved.chunks(),
                request.temperature,
            )
            .await?;

        tracker.enter(Stage::Done);
        Ok(Answer {
            request_id,
            text,
            context: retrieved,
        })
    }
}
