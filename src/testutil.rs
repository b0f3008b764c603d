//! Deterministic test doubles for the three external collaborators.

use crate::chunking::Chunk;
use crate::database::{IndexEntry, ScoredChunk, VectorIndex};
use crate::error::{RagError, Result};
use crate::providers::{Embedder, Embedding, Synthesizer};
use crate::rag::NO_ANSWER;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

/// Tiny vocabulary for the bag-of-words embedding space
const VOCAB: &[&str] = &[
    "capital", "france", "paris", "cheese", "milk", "weather", "document", "sailing",
];

/// Embedder that counts vocabulary words, so texts sharing words land close
/// together under cosine similarity. Counts its calls.
pub struct StubEmbedder {
    fail_marker: Option<&'static str>,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        StubEmbedder {
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Variant that refuses any text containing `marker`
    pub fn failing_on(marker: &'static str) -> Self {
        StubEmbedder {
            fail_marker: Some(marker),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);

        if let Some(marker) = self.fail_marker {
            if text.contains(marker) {
                return Err(RagError::EmbeddingService(
                    "stub embedder refused this text".to_string(),
                ));
            }
        }

        let lower = text.to_lowercase();
        let mut values: Vec<f32> = VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        // Constant component keeps every vector off the origin
        values.push(1.0);
        Ok(Embedding { values })
    }
}

/// Synthesizer that behaves like a perfectly context-bounded model: it
/// answers from a rule only when the rule's evidence appears in the prompt,
/// and gives the sentinel otherwise. Counts its calls.
pub struct StubSynthesizer {
    rules: Vec<(String, String)>,
    pub calls: AtomicUsize,
}

impl StubSynthesizer {
    /// `rules` pairs (evidence substring, answer)
    pub fn new(rules: Vec<(String, String)>) -> Self {
        StubSynthesizer {
            rules,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Synthesizer for StubSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);

        for (evidence, answer) in &self.rules {
            if prompt.contains(evidence.as_str()) {
                return Ok(answer.clone());
            }
        }
        Ok(NO_ANSWER.to_string())
    }
}

/// In-memory vector index with cosine similarity and the same deterministic
/// ordering contract as the Qdrant adapter.
pub struct MemoryIndex {
    entries: Mutex<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl VectorIndex for MemoryIndex {
    async fn upsert(&self, mut entries: Vec<IndexEntry>) -> Result<()> {
        self.entries.lock().unwrap().append(&mut entries);
        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.lock().unwrap();
        let mut hits: Vec<(u64, ScoredChunk)> = entries
            .iter()
            .map(|entry| {
                (
                    entry.id,
                    ScoredChunk {
                        chunk: entry.chunk.clone(),
                        score: cosine(&entry.vector.values, &query.values),
                    },
                )
            })
            .collect();

        hits.sort_by(|(a_id, a), (b_id, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a_id.cmp(b_id))
        });
        hits.truncate(limit);

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Build an index entry around a bare text chunk
pub fn chunk_entry(id: u64, text: &str, vector: Embedding) -> IndexEntry {
    IndexEntry {
        id,
        vector,
        chunk: Chunk {
            text: text.to_string(),
            document_id: "test-doc".to_string(),
            chunk_index: id as usize,
            start_offset: 0,
            metadata: HashMap::new(),
        },
    }
}
