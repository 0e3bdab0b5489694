mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    ingest_folder, CharacterNgramEmbedder, ChunkingConfig, DocumentStore, Embedder, FastEmbedder,
    IngestOutcome, IngestionOptions, LocalIndex, LopdfExtractor, QdrantIndex, QueryService,
    VectorIndex, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION, DEFAULT_PDF_FOLDER,
    DEFAULT_PERSIST_DIR, DEFAULT_TOP_K,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type AppStore = DocumentStore<Box<dyn Embedder>, Box<dyn VectorIndex>>;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the local vector index
    #[arg(long, env = "PDF_RAG_PERSIST_DIR", default_value = DEFAULT_PERSIST_DIR)]
    persist_dir: PathBuf,

    /// Collection name
    #[arg(long, env = "PDF_RAG_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Qdrant base URL; when set, records live in Qdrant instead of the local index
    #[arg(long, env = "PDF_RAG_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Where the embedding model files are downloaded and cached
    #[arg(long, env = "PDF_RAG_MODEL_CACHE")]
    model_cache_dir: Option<PathBuf>,

    /// Use the hashing embedder instead of downloading the sentence-transformer model
    #[arg(long, default_value_t = false)]
    offline_embedder: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store every PDF found under a folder.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long, default_value = DEFAULT_PDF_FOLDER)]
        folder: PathBuf,
        /// Words per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Words shared by consecutive chunks.
        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
    },
    /// Serve POST /query over HTTP.
    Serve {
        /// Address to bind (host:port).
        #[arg(long, env = "PDF_RAG_BIND", default_value = "127.0.0.1:8008")]
        bind: String,
        /// Number of chunks returned per question.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(log_filter())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    let store = open_store(&cli).await?;

    match cli.command {
        Command::Ingest {
            folder,
            chunk_size,
            chunk_overlap,
        } => {
            let config = ChunkingConfig::try_from(IngestionOptions {
                chunk_size,
                chunk_overlap,
            })?;
            let outcome = ingest_folder(&folder, &store, &LopdfExtractor, config)
                .await
                .with_context(|| format!("ingesting {}", folder.display()))?;

            match outcome {
                IngestOutcome::MissingFolder(path) => {
                    println!("folder does not exist: {}", path.display());
                }
                IngestOutcome::Completed(report) => {
                    for skipped in &report.skipped_files {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                    }
                    println!(
                        "{} records added from {} pdf(s), {} skipped, at {}",
                        report.records_added,
                        report.files_processed,
                        report.skipped_files.len(),
                        Utc::now().to_rfc3339()
                    );
                }
            }
        }
        Command::Serve { bind, top_k } => {
            let service = QueryService::new(Arc::new(store)).with_top_k(top_k);
            let app = server::router(service);

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!(bind = %bind, top_k, "listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server shutdown")?;
        }
    }

    Ok(())
}

/// `RUST_LOG` when it is set and valid, `info` otherwise.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

async fn open_store(cli: &Cli) -> anyhow::Result<AppStore> {
    let embedder: Box<dyn Embedder> = if cli.offline_embedder {
        Box::new(CharacterNgramEmbedder::default())
    } else {
        Box::new(FastEmbedder::new(cli.model_cache_dir.clone()))
    };

    let index: Box<dyn VectorIndex> = match &cli.qdrant_url {
        Some(url) => {
            let qdrant = QdrantIndex::new(url, cli.collection.clone(), embedder.dimensions())?;
            qdrant
                .ensure_collection()
                .await
                .with_context(|| format!("preparing qdrant collection {}", cli.collection))?;
            info!(url = %url, collection = %cli.collection, "using qdrant index");
            Box::new(qdrant)
        }
        None => {
            let local = LocalIndex::open(&cli.persist_dir, &cli.collection)
                .with_context(|| format!("opening index in {}", cli.persist_dir.display()))?;
            info!(path = %local.path().display(), "using local index");
            Box::new(local)
        }
    };

    Ok(DocumentStore::new(embedder, index))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn log_filter_defaults_to_info() {
        std::env::remove_var(EnvFilter::DEFAULT_ENV);
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::INFO));
    }
}
