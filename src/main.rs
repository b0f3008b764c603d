use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{info, warn};
use std::path::PathBuf;

use corpus_rag::chunking::ChunkingConfig;
use corpus_rag::database::{QdrantConfig, QdrantIndex};
use corpus_rag::gemini::{GeminiClient, GeminiConfig};
use corpus_rag::ingestion::{self, IngestionPipeline};
use corpus_rag::rag::{RagConfig, RagEngine};

/// Retrieval-augmented question answering over a private document corpus
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, chunk, embed and index every supported document under a directory
    Ingest {
        /// Root directory of the document corpus
        #[arg(default_value = "data")]
        data_dir: PathBuf,
    },
    /// Answer a question from the indexed corpus
    Query {
        /// The question; starts an interactive loop when omitted
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    // Load all configuration up front so a missing credential fails the
    // process before any pipeline starts
    let gemini_config = GeminiConfig::from_env()?;
    let qdrant_config = QdrantConfig::from_env()?;
    let chunking_config = ChunkingConfig::from_env()?;
    let rag_config = RagConfig::from_env()?;

    let gemini = GeminiClient::new(gemini_config);
    let index = QdrantIndex::connect(qdrant_config)
        .await
        .context("Failed to initialize vector index")?;

    match cli.command {
        Command::Ingest { data_dir } => {
            info!("Ingesting corpus from {}", data_dir.display());
            let concurrency = ingestion::embed_concurrency_from_env()?;
            let pipeline = IngestionPipeline::new(gemini, index, chunking_config, concurrency);

            let summary = pipeline
                .run(&data_dir)
                .await
                .context("Ingestion run failed")?;

            for failure in &summary.files_failed {
                warn!("Skipped {}: {}", failure.path.display(), failure.error);
            }
            info!(
                "Indexed {}/{} chunks from {} documents ({} files skipped, {} chunks dropped)",
                summary.chunks_indexed,
                summary.chunks_total,
                summary.documents_loaded,
                summary.files_failed.len(),
                summary.chunks_failed,
            );
        }

        Command::Query { question } => {
            let engine = RagEngine::new(gemini.clone(), gemini, index, rag_config);

            match question {
                Some(question) => {
                    let answer = engine.answer(&question).await?;
                    println!("{}", answer.text);
                }
                None => {
                    engine
                        .run_query_loop()
                        .await
                        .context("Error in query loop")?;
                }
            }
        }
    }

    Ok(())
}
