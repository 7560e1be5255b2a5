use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use doc_qa_core::{
    load_documents_best_effort, Answer, CharacterNgramEmbedder, ChunkingConfig, Corpus, Document,
    OpenAiClient, OpenAiGenerator, Pipeline, PipelineConfig, ProviderSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "doc-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenAI-compatible API base URL. Overrides OPENAI_API_BASE.
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Embedding model name
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Completion model name
    #[arg(long, global = true)]
    completion_model: Option<String>,

    /// Per-request provider timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Embed with the offline trigram embedder instead of the provider.
    #[arg(long, global = true, default_value_t = false)]
    local_embeddings: bool,
}

#[derive(Args)]
struct DocumentArgs {
    /// Plain-text file to include. Repeat for several files.
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Folder scanned recursively for .txt files.
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(Args)]
struct ChunkingArgs {
    /// Maximum chunk length in characters
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters repeated from the end of one chunk at the start of the next
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question from the given documents.
    Ask {
        #[command(flatten)]
        documents: DocumentArgs,

        /// Question to answer
        #[arg(long)]
        query: String,

        /// Provider API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Sampling temperature between 0.0 and 1.0
        #[arg(long, default_value = "0.3")]
        temperature: f32,

        /// Number of chunks handed to the answer model
        #[arg(long, default_value = "3")]
        k: usize,

        /// Print the retrieved chunks with their scores.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Preview the documents and the chunks they split into.
    Chunks {
        #[command(flatten)]
        documents: DocumentArgs,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "doc-qa boot"
    );

    match &cli.command {
        Command::Ask {
            documents,
            query,
            api_key,
            chunking,
            temperature,
            k,
            show_context,
        } => {
            let documents = load(documents)?;
            let config = PipelineConfig {
                chunk_size: chunking.chunk_size,
                chunk_overlap: chunking.chunk_overlap,
                temperature: *temperature,
                k: *k,
                ..PipelineConfig::default()
            };
            let pipeline = build_pipeline(&cli)?;

            let answer = pipeline
                .run_until(&documents, query, api_key, &config, interrupted())
                .await?;

            print_answer(&answer, *show_context);
        }
        Command::Chunks {
            documents,
            chunking,
        } => {
            let documents = load(documents)?;
            let config = PipelineConfig {
                chunk_size: chunking.chunk_size,
                chunk_overlap: chunking.chunk_overlap,
                ..PipelineConfig::default()
            };

            for document in &documents {
                println!(
                    "document: {} chars={} sha256={}",
                    document.name,
                    document.content.chars().count(),
                    document.checksum
                );
                println!("{}", preview(&document.content));
            }

            let corpus = Corpus::concatenate(&documents);
            let chunks = corpus.split(&ChunkingConfig::from(&config))?;
            println!("{} chunk(s)", chunks.len());
            for chunk in chunks {
                println!(
                    "[{}] chunk={} chars={} sources={}",
                    chunk.index,
                    chunk.chunk_id,
                    chunk.text.chars().count(),
                    chunk.sources.join(",")
                );
                println!("{}", chunk.text);
            }
        }
    }

    Ok(())
}

fn provider_settings(cli: &Cli) -> anyhow::Result<ProviderSettings> {
    let mut settings = ProviderSettings::from_env()?;
    if let Some(base) = &cli.api_base {
        settings = settings.with_api_base(base)?;
    }
    if let Some(model) = &cli.embedding_model {
        settings.embedding_model = model.clone();
    }
    if let Some(model) = &cli.completion_model {
        settings.completion_model = model.clone();
    }
    if let Some(seconds) = cli.timeout_secs {
        settings.timeout = Some(Duration::from_secs(seconds));
    }
    Ok(settings)
}

fn build_pipeline(cli: &Cli) -> anyhow::Result<Pipeline> {
    let settings = provider_settings(cli)?;
    if !cli.local_embeddings {
        return Ok(Pipeline::openai(settings)?);
    }

    info!("using local trigram embeddings");
    let generator = OpenAiGenerator::new(OpenAiClient::new(settings)?);
    Ok(Pipeline::new(
        Arc::new(CharacterNgramEmbedder::default()),
        Arc::new(generator),
    ))
}

fn load(args: &DocumentArgs) -> anyhow::Result<Vec<Document>> {
    let report = load_documents_best_effort(&args.files, args.folder.as_deref())?;

    if !report.skipped_files.is_empty() {
        warn!(skipped_files = report.skipped_files.len(), "some files were not loaded");
        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
        }
    }

    info!(
        documents = report.documents.len(),
        folder = ?args.folder,
        "loaded documents"
    );
    Ok(report.documents)
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed the run
/// is simply never interrupted.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn preview(content: &str) -> String {
    let mut text: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        text.push_str("...");
    }
    text
}

fn print_answer(answer: &Answer, show_context: bool) {
    println!("{}", answer.text);

    if show_context {
        println!();
        println!("request_id: {}", answer.request_id);
        for hit in &answer.context.hits {
            println!(
                "[{}] score={:.4} sources={}",
                hit.chunk.index,
                hit.score,
                hit.chunk.sources.join(",")
            );
            println!("{}", hit.chunk.text);
        }
    }
}
