use crate::chunking::{self, ChunkingConfig};
use crate::database::{IndexEntry, VectorIndex};
use crate::error::{RagError, Result};
use crate::loader::{self, LoadFailure};
use crate::providers::Embedder;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::env;
use std::path::Path;

const DEFAULT_EMBED_CONCURRENCY: usize = 8;

/// Read the embedding concurrency limit from the environment
pub fn embed_concurrency_from_env() -> Result<usize> {
    match env::var("EMBED_CONCURRENCY") {
        Ok(raw) => match raw.parse() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(RagError::configuration(format!(
                "EMBED_CONCURRENCY must be a positive integer, got {:?}",
                raw
            ))),
        },
        Err(_) => Ok(DEFAULT_EMBED_CONCURRENCY),
    }
}

/// What one ingestion run accomplished
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub documents_loaded: usize,
    pub files_failed: Vec<LoadFailure>,
    pub chunks_total: usize,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
}

/// Batch pipeline: load documents, chunk, embed, persist to the vector index.
///
/// The sole writer to the index. Per-file and per-chunk failures are logged
/// and skipped; a run only fails outright when it would leave the index with
/// nothing at all.
pub struct IngestionPipeline<E, V> {
    embedder: E,
    index: V,
    chunking: ChunkingConfig,
    concurrency: usize,
}

impl<E: Embedder, V: VectorIndex> IngestionPipeline<E, V> {
    pub fn new(embedder: E, index: V, chunking: ChunkingConfig, concurrency: usize) -> Self {
        IngestionPipeline {
            embedder,
            index,
            chunking,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest every supported document under `root`.
    ///
    /// Chunk embeddings are computed concurrently up to the configured limit;
    /// the index write is a single batch at the end, so a failed or canceled
    /// run never leaves partial entries behind.
    pub async fn run(&self, root: &Path) -> Result<IngestionSummary> {
        let corpus = loader::load_directory(root)?;
        let documents_loaded = corpus.documents.len();

        if corpus.documents.is_empty() {
            warn!("No documents found under {}", root.display());
            return Ok(IngestionSummary {
                documents_loaded: 0,
                files_failed: corpus.failures,
                ..Default::default()
            });
        }

        let chunks = chunking::chunk_documents(&corpus.documents, &self.chunking);
        if chunks.is_empty() {
            return Err(RagError::IngestionFailed(format!(
                "{} documents yielded no chunks",
                documents_loaded
            )));
        }
        let chunks_total = chunks.len();
        info!(
            "Split {} documents into {} chunks",
            documents_loaded, chunks_total
        );

        // Ids are assigned before embedding so they are independent of
        // completion order
        let embedder = &self.embedder;
        let results: Vec<(u64, chunking::Chunk, Result<crate::providers::Embedding>)> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(id, chunk)| async move {
                    let embedded = embedder.embed(&chunk.text).await;
                    (id as u64, chunk, embedded)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut entries = Vec::with_capacity(results.len());
        let mut chunks_failed = 0;
        for (id, chunk, embedded) in results {
            match embedded {
                Ok(vector) => entries.push(IndexEntry { id, vector, chunk }),
                Err(e) => {
                    chunks_failed += 1;
                    warn!(
                        "Dropping chunk {} of {}: {}",
                        chunk.chunk_index, chunk.document_id, e
                    );
                }
            }
        }

        if entries.is_empty() {
            return Err(RagError::IngestionFailed(format!(
                "all {} chunk embeddings failed",
                chunks_total
            )));
        }

        entries.sort_by_key(|entry| entry.id);
        let chunks_indexed = entries.len();
        self.index.upsert(entries).await?;
        info!(
            "Indexed {}/{} chunks from {} documents",
            chunks_indexed, chunks_total, documents_loaded
        );

        Ok(IngestionSummary {
            documents_loaded,
            files_failed: corpus.failures,
            chunks_total,
            chunks_indexed,
            chunks_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryIndex, StubEmbedder};
    use std::fs;
    use std::fs::File;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    fn config() -> ChunkingConfig {
        ChunkingConfig::new(1000, 100).unwrap()
    }

    #[tokio::test]
    async fn missing_root_propagates() {
        let pipeline = IngestionPipeline::new(StubEmbedder::new(), MemoryIndex::new(), config(), 2);
        let err = pipeline
            .run(Path::new("/definitely/not/a/real/dir"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::MissingInputDirectory(_)));
    }

    #[tokio::test]
    async fn empty_directory_is_a_successful_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = StubEmbedder::new();
        let index = MemoryIndex::new();
        let pipeline = IngestionPipeline::new(&embedder, &index, config(), 2);

        let summary = pipeline.run(dir.path()).await.unwrap();
        assert_eq!(summary.chunks_total, 0);
        assert_eq!(summary.chunks_indexed, 0);
        assert_eq!(index.len(), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_bad_file_out_of_three_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "The capital of France is Paris.").unwrap();
        fs::write(dir.path().join("b.txt"), "Cheese is made from milk.").unwrap();
        let mut bad = File::create(dir.path().join("c.txt")).unwrap();
        bad.write_all(&[0xff, 0xfe, 0xff]).unwrap();

        let index = MemoryIndex::new();
        let pipeline = IngestionPipeline::new(StubEmbedder::new(), &index, config(), 2);
        let summary = pipeline.run(dir.path()).await.unwrap();

        assert_eq!(summary.documents_loaded, 2);
        assert_eq!(summary.files_failed.len(), 1);
        assert_eq!(summary.chunks_indexed, 2);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn failed_embeddings_are_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.txt"), "Plain sailing here.").unwrap();
        fs::write(dir.path().join("poison.txt"), "POISON chunk content.").unwrap();

        let index = MemoryIndex::new();
        let embedder = StubEmbedder::failing_on("POISON");
        let pipeline = IngestionPipeline::new(embedder, &index, config(), 2);
        let summary = pipeline.run(dir.path()).await.unwrap();

        assert_eq!(summary.chunks_total, 2);
        assert_eq!(summary.chunks_indexed, 1);
        assert_eq!(summary.chunks_failed, 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn all_embeddings_failing_is_ingestion_failed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.txt"), "POISON everywhere.").unwrap();

        let index = MemoryIndex::new();
        let pipeline =
            IngestionPipeline::new(StubEmbedder::failing_on("POISON"), &index, config(), 2);
        let err = pipeline.run(dir.path()).await.unwrap_err();

        assert!(matches!(err, RagError::IngestionFailed(_)));
        assert_eq!(index.len(), 0);
    }
}
