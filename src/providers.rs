use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Capability to map a text string to a fixed-length vector.
///
/// Ingestion and retrieval must go through the same implementation, or the
/// similarity scores between their vectors are meaningless.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

impl<E: Embedder> Embedder for &E {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text).await
    }
}

/// Capability to turn an assembled prompt into generated text.
#[allow(async_fn_in_trait)]
pub trait Synthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<String>;
}

impl<S: Synthesizer> Synthesizer for &S {
    async fn synthesize(&self, prompt: &str) -> Result<String> {
        (**self).synthesize(prompt).await
    }
}
