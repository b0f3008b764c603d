use crate::chunking::Chunk;
use crate::error::{RagError, Result};
use crate::providers::Embedding;
use log::{debug, info};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, with_payload_selector, CreateCollectionBuilder, Distance,
    PointStruct, SearchPoints, UpsertPointsBuilder, VectorParams, WithPayloadSelector,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::env;

const DEFAULT_COLLECTION: &str = "rag_corpus";
const DEFAULT_VECTOR_SIZE: u64 = 768; // Dimension of the default embedding model

/// A persisted (vector, chunk) pair; written once, never updated
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: u64,
    pub vector: Embedding,
    pub chunk: Chunk,
}

/// One retrieval hit, ordered by descending similarity
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Append-only nearest-neighbor store over chunk embeddings.
///
/// Ingestion is the sole writer; retrieval only reads. `search` returns at
/// most `limit` hits sorted by descending similarity with a deterministic
/// tie-break, so identical index state yields identical results.
#[allow(async_fn_in_trait)]
pub trait VectorIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;
    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>>;
}

impl<V: VectorIndex> VectorIndex for &V {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        (**self).upsert(entries).await
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        (**self).search(query, limit).await
    }
}

/// Configuration for the Qdrant-backed index
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_size: u64,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL")
            .map_err(|_| RagError::configuration("QDRANT_URL is not set"))?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());
        let vector_size = match env::var("EMBEDDING_DIM") {
            Ok(raw) => raw.parse().map_err(|_| {
                RagError::configuration(format!("EMBEDDING_DIM must be an integer, got {:?}", raw))
            })?,
            Err(_) => DEFAULT_VECTOR_SIZE,
        };

        Ok(QdrantConfig {
            url,
            api_key,
            collection,
            vector_size,
        })
    }
}

/// Qdrant-backed vector index over one corpus-wide collection
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect to Qdrant and create the collection if it does not exist yet.
    ///
    /// Every vector written to or queried against this collection must have
    /// the configured dimension.
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        let builder = Qdrant::from_url(&config.url);
        let builder = if let Some(api_key) = config.api_key {
            builder.api_key(api_key)
        } else {
            builder
        };
        let client = builder
            .build()
            .map_err(|e| RagError::index(format!("failed to connect to Qdrant: {}", e)))?;

        let index = QdrantIndex {
            client,
            collection: config.collection,
        };

        if index.collection_exists().await? {
            debug!("Using existing collection {}", index.collection);
        } else {
            info!("Creating collection {}", index.collection);
            let create_collection = CreateCollectionBuilder::new(index.collection.clone())
                .vectors_config(VectorParams {
                    size: config.vector_size,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                });
            index
                .client
                .create_collection(create_collection)
                .await
                .map_err(|e| {
                    RagError::index(format!(
                        "failed to create collection {}: {}",
                        index.collection, e
                    ))
                })?;
        }

        Ok(index)
    }

    async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RagError::index(format!("failed to check collection existence: {}", e)))
    }
}

impl VectorIndex for QdrantIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let points = entries
            .into_iter()
            .map(|entry| {
                let payload = Payload::try_from(json!({
                    "text": entry.chunk.text,
                    "document_id": entry.chunk.document_id,
                    "chunk_index": entry.chunk.chunk_index,
                    "start_offset": entry.chunk.start_offset,
                    "metadata": entry.chunk.metadata,
                }))
                .map_err(|e| RagError::index(format!("failed to build payload: {}", e)))?;

                Ok(PointStruct::new(entry.id, entry.vector.values, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        // wait(true) so the write is durable before the pipeline returns
        let upsert_request = UpsertPointsBuilder::new(self.collection.clone(), points)
            .wait(true)
            .build();

        self.client.upsert_points(upsert_request).await.map_err(|e| {
            RagError::index(format!(
                "failed to upsert points in collection {}: {}",
                self.collection, e
            ))
        })?;

        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        let search_request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query.values.clone(),
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self.client.search_points(search_request).await.map_err(|e| {
            RagError::index(format!(
                "failed to search collection {}: {}",
                self.collection, e
            ))
        })?;

        let mut hits: Vec<(u64, ScoredChunk)> = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let id = match scored_point.id?.point_id_options? {
                    PointIdOptions::Num(num) => num,
                    PointIdOptions::Uuid(_) => return None,
                };
                let chunk = chunk_from_payload(&scored_point.payload)?;
                Some((
                    id,
                    ScoredChunk {
                        chunk,
                        score: scored_point.score,
                    },
                ))
            })
            .collect();

        // Descending similarity, ties broken by entry id for reproducibility
        hits.sort_by(|(a_id, a), (b_id, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a_id.cmp(b_id))
        });

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }
}

/// Rebuild a chunk from the payload stored alongside its vector.
///
/// A point with no readable text is dropped; the other fields fall back to
/// defaults so an older payload shape still yields a usable hit.
fn chunk_from_payload(payload: &HashMap<String, qdrant_client::qdrant::Value>) -> Option<Chunk> {
    let text = payload.get("text")?.as_str()?.to_string();
    let document_id = payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .cloned()
        .unwrap_or_default();
    let chunk_index = payload
        .get("chunk_index")
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as usize;
    let start_offset = payload
        .get("start_offset")
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as usize;
    let metadata: HashMap<String, serde_json::Value> = payload
        .get("metadata")
        .and_then(|v| serde_json::from_value(v.clone().into_json()).ok())
        .unwrap_or_default();

    Some(Chunk {
        text,
        document_id,
        chunk_index,
        start_offset,
        metadata,
    })
}
