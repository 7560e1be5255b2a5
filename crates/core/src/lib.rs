pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod retriever;
pub mod stores;
pub mod synthesizer;
pub mod traits;

pub use chunking::{split, ChunkingConfig, Corpus, DOCUMENT_SEPARATOR};
pub use config::{PipelineConfig, ProviderSettings};
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_LOCAL_DIMENSIONS};
pub use error::{ErrorKind, IngestError, QaError};
pub use ingest::{
    discover_text_files, load_document, load_documents_best_effort, IngestionReport, SkippedFile,
};
pub use models::{
    Answer, ApiKey, Chunk, Document, EmbeddingVector, IndexEntry, QueryRequest, RetrievalResult,
    RetrievedChunk,
};
pub use pipeline::{Pipeline, PipelineFailure, Stage};
pub use providers::{OpenAiClient, OpenAiEmbedder, OpenAiGenerator};
pub use retriever::Retriever;
pub use stores::InMemoryIndex;
pub use synthesizer::{build_prompt, AnswerSynthesizer};
pub use traits::{Embedder, Generator, VectorIndex};
