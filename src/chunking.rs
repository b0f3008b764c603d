use crate::error::{RagError, Result};
use crate::loader::Document;
use serde_json::Value;
use std::collections::HashMap;
use std::env;

const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
const DEFAULT_OVERLAP_SIZE: usize = 100;

/// Chunking parameters, in characters
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Upper bound on the character length of a chunk
    pub max_chunk_size: usize,
    /// Characters shared between consecutive chunks of one document
    pub overlap_size: usize,
}

impl ChunkingConfig {
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(RagError::configuration("CHUNK_SIZE must be positive"));
        }
        if overlap_size == 0 || overlap_size >= max_chunk_size {
            return Err(RagError::configuration(
                "CHUNK_OVERLAP must be positive and smaller than CHUNK_SIZE",
            ));
        }
        Ok(ChunkingConfig {
            max_chunk_size,
            overlap_size,
        })
    }

    /// Read chunking parameters from the environment, with defaults
    pub fn from_env() -> Result<Self> {
        let max_chunk_size = read_env_usize("CHUNK_SIZE", DEFAULT_MAX_CHUNK_SIZE)?;
        let overlap_size = read_env_usize("CHUNK_OVERLAP", DEFAULT_OVERLAP_SIZE)?;
        Self::new(max_chunk_size, overlap_size)
    }
}

fn read_env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| RagError::configuration(format!("{} must be an integer, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

/// A bounded, overlapping window of a document, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The text content of this chunk, never empty
    pub text: String,
    /// Identifier of the document this chunk belongs to (its source path)
    pub document_id: String,
    /// Position of this chunk in the document's chunk sequence
    pub chunk_index: usize,
    /// Character offset of this chunk in the original document
    pub start_offset: usize,
    /// Metadata inherited from the source document
    pub metadata: HashMap<String, Value>,
}

/// Chunk a whole corpus, preserving document order
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_document(doc, config))
        .collect()
}

/// Split one document into overlapping character windows.
///
/// Each window holds at most `max_chunk_size` characters. The cut point
/// prefers a paragraph break, then a sentence end, then any whitespace in the
/// tail of the window, before falling back to a hard character cut. The next
/// window starts exactly `overlap_size` characters before the previous cut,
/// so consecutive chunks share exactly that many characters wherever the cut
/// landed. Whitespace-only windows are dropped. Deterministic for a given
/// (text, config) pair.
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = document.content.chars().collect();
    let total = chars.len();
    let document_id = document.source_path.display().to_string();

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while start < total {
        let hard_end = (start + config.max_chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            find_cut(&chars, start + config.overlap_size + 1, hard_end)
        };

        let text: String = chars[start..end].iter().collect();
        if !text.trim().is_empty() {
            chunks.push(Chunk {
                text,
                document_id: document_id.clone(),
                chunk_index: index,
                start_offset: start,
                metadata: document.metadata.clone(),
            });
            index += 1;
        }

        if end == total {
            break;
        }
        // Exact configured overlap with the chunk that ended at `end`
        start = end - config.overlap_size;
    }

    chunks
}

/// Pick a cut position in `(floor, hard_end]`, preferring text boundaries.
///
/// Only the tail fifth of the window is searched, so a boundary-poor window
/// still yields a near-full chunk. The returned position sits just after the
/// boundary, keeping it in the current chunk.
fn find_cut(chars: &[char], floor: usize, hard_end: usize) -> usize {
    let lookback = ((hard_end - floor) / 5).max(1);
    let search_from = hard_end.saturating_sub(lookback).max(floor);

    // Paragraph break: cut after "\n\n"
    for pos in (search_from..hard_end).rev() {
        if chars[pos] == '\n' && pos > 0 && chars[pos - 1] == '\n' {
            return pos + 1;
        }
    }

    // Sentence end: cut after ".!?" followed by whitespace
    for pos in (search_from..hard_end - 1).rev() {
        if matches!(chars[pos], '.' | '!' | '?') && chars[pos + 1].is_whitespace() {
            return pos + 2;
        }
    }

    // Word boundary: cut after any whitespace
    for pos in (search_from..hard_end).rev() {
        if chars[pos].is_whitespace() {
            return pos + 1;
        }
    }

    hard_end
}
