use crate::error::{RagError, Result};
use crate::providers::{Embedder, Embedding, Synthesizer};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
const DEFAULT_GENERATE_MODEL: &str = "models/gemini-2.0-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embedding_model: String,
    pub generate_model: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables.
    ///
    /// A missing API key is fatal here, before any pipeline starts.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| RagError::configuration("GEMINI_API_KEY is not set"))?;
        let embedding_model = env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let generate_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GENERATE_MODEL.to_string());

        Ok(GeminiConfig {
            api_key,
            embedding_model,
            generate_model,
        })
    }
}

/// Client for interacting with the Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        GeminiClient { config, client }
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/{}:embedContent?key={}",
            API_BASE, self.config.embedding_model, self.config.api_key
        )
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.config.generate_model, self.config.api_key
        )
    }
}

impl Embedder for GeminiClient {
    /// Generate an embedding for a text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: Content::new(text),
        };

        let response = self
            .client
            .post(self.embed_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::EmbeddingService(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        let response_data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }
}

impl Synthesizer for GeminiClient {
    /// Generate text for an assembled prompt
    async fn synthesize(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::SynthesisService(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::SynthesisService(format!(
                "API request failed: {}",
                error_text
            )));
        }

        let response_data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::SynthesisService(e.to_string()))?;

        // Unwrap the structured reply to its first text part
        response_data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RagError::SynthesisService("no response generated".to_string()))
    }
}

// Request/response wire structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: None,
        }
    }

    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
