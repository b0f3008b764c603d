use crate::error::{RagError, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// Path of the file this document was loaded from
    pub source_path: PathBuf,
    /// The actual text content of the document
    pub content: String,
    /// Source metadata carried through to every chunk of this document
    pub metadata: HashMap<String, Value>,
}

/// A file that could not be loaded; the walk continues past it
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// The result of walking a corpus directory
#[derive(Debug, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
}

/// Recursively load every supported file under `root`, following symlinks.
///
/// Unsupported file types are skipped silently; a file whose extractor fails
/// is recorded in `failures` and does not abort the walk, and so is an entry
/// the walk itself cannot read (dangling symlink, unreadable subdirectory).
/// A missing root is an error, an empty root is an empty corpus.
pub fn load_directory(root: &Path) -> Result<LoadedCorpus> {
    if !root.is_dir() {
        return Err(RagError::MissingInputDirectory(root.to_path_buf()));
    }

    let mut corpus = LoadedCorpus::default();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                warn!("Failed to walk {}: {}", path.display(), e);
                corpus.failures.push(LoadFailure {
                    path,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        match extract_documents(path) {
            Ok(mut documents) => {
                info!("Loaded {}", path.display());
                corpus.documents.append(&mut documents);
            }
            Err(RagError::UnsupportedFileType(mime)) => {
                debug!("Skipping unsupported file {} ({})", path.display(), mime);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                corpus.failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(corpus)
}

/// Extract the documents contained in a single file, dispatching on MIME type.
///
/// Text and PDF files yield one document; a JSON file yields one document per
/// record it contains.
pub fn extract_documents(path: &Path) -> Result<Vec<Document>> {
    let mime = from_path(path).first_or_octet_stream();
    let mime_type = mime.to_string();
    debug!("Detected MIME type {} for {}", mime_type, path.display());

    match mime_type.as_str() {
        m if m.starts_with("application/pdf") => {
            let content = extract_text(path)
                .map_err(|e| RagError::extraction(path, format!("PDF extraction failed: {}", e)))?;

            // PDF extraction can include excessive whitespace
            let cleaned = normalize_whitespace(&content);
            if cleaned.is_empty() {
                warn!("Extracted PDF content is empty: {}", path.display());
            }

            Ok(vec![Document {
                source_path: path.to_path_buf(),
                content: cleaned,
                metadata: HashMap::new(),
            }])
        }

        m if m.starts_with("application/json") => {
            let raw = fs::read_to_string(path).map_err(|e| RagError::extraction(path, e))?;
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| RagError::extraction(path, format!("invalid JSON: {}", e)))?;
            Ok(project_records(path, value))
        }

        m if m.starts_with("text/") => {
            let content = fs::read_to_string(path).map_err(|e| RagError::extraction(path, e))?;
            Ok(vec![Document {
                source_path: path.to_path_buf(),
                content,
                metadata: HashMap::new(),
            }])
        }

        _ => Err(RagError::UnsupportedFileType(mime_type)),
    }
}

/// Turn a parsed JSON value into documents, one per record.
///
/// Content is taken from the `description` field, falling back to
/// `section_desc`; the full record is retained as metadata. A record with
/// neither field is skipped.
fn project_records(path: &Path, value: Value) -> Vec<Document> {
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut documents = Vec::new();
    for record in records {
        let content = record
            .get("description")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                record
                    .get("section_desc")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
            });

        match content {
            Some(text) => {
                let metadata = match &record {
                    Value::Object(map) => map.clone().into_iter().collect(),
                    _ => HashMap::new(),
                };
                documents.push(Document {
                    source_path: path.to_path_buf(),
                    content: text.to_string(),
                    metadata,
                });
            }
            None => {
                warn!(
                    "Skipping record in {} with no description or section_desc",
                    path.display()
                );
            }
        }
    }

    documents
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    // Replace multiple spaces with a single space
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    // Handle trailing newlines
    if newline_count > 0 {
        if newline_count >= 2 {
            normalized.push_str("\n\n");
        } else {
            normalized.push('\n');
        }
    }

    normalized.trim().to_string()
}
