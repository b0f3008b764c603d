use crate::database::{ScoredChunk, VectorIndex};
use crate::error::{RagError, Result};
use crate::providers::{Embedder, Synthesizer};
use log::{debug, error, info};
use std::env;
use std::io::{self, Write};

/// The recognizable answer the model is instructed to give when the
/// retrieved context does not contain the answer. Receiving it is a
/// successful, context-bounded result, not an error.
pub const NO_ANSWER: &str = "I don't know";

const DEFAULT_TOP_K: usize = 4;

/// Retrieval parameters
#[derive(Debug, Clone, Copy)]
pub struct RagConfig {
    /// Number of nearest chunks to retrieve per question
    pub top_k: usize,
}

impl RagConfig {
    pub fn new(top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::configuration("RETRIEVAL_K must be positive"));
        }
        Ok(RagConfig { top_k })
    }

    /// Read retrieval parameters from the environment, with defaults
    pub fn from_env() -> Result<Self> {
        match env::var("RETRIEVAL_K") {
            Ok(raw) => {
                let top_k = raw.parse().map_err(|_| {
                    RagError::configuration(format!(
                        "RETRIEVAL_K must be an integer, got {:?}",
                        raw
                    ))
                })?;
                Self::new(top_k)
            }
            Err(_) => Self::new(DEFAULT_TOP_K),
        }
    }
}

/// The synthesized reply to one question
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    /// Whether the model claims to have found the answer in the context
    pub fn is_grounded(&self) -> bool {
        self.text != NO_ANSWER
    }
}

/// Assemble the prompt from the retrieved chunks and the question.
///
/// The chunks are the only permissible evidentiary context; the template
/// instructs the model to answer from them alone and to fall back to the
/// `NO_ANSWER` sentinel otherwise. Zero retrieved chunks still use the same
/// template with an empty context section.
pub fn build_prompt(hits: &[ScoredChunk], question: &str) -> String {
    let context = hits
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<&str>>()
        .join("\n\n");

    format!(
        "Answer the question based only on the following context:\n\
         {context}\n\n\
         If the context does not contain the answer, say \"{NO_ANSWER}\".\n\
         Never mention the provided context in your answer. The answer should \
         be short and concise, yet informative.\n\n\
         Question: {question}\n"
    )
}

/// Retrieval-Synthesis pipeline: question in, grounded answer out.
///
/// Read-only client of the vector index; invocations share no mutable state,
/// so any number of questions may be answered concurrently.
pub struct RagEngine<E, S, V> {
    embedder: E,
    synthesizer: S,
    index: V,
    config: RagConfig,
}

impl<E: Embedder, S: Synthesizer, V: VectorIndex> RagEngine<E, S, V> {
    /// Create a new RAG engine
    pub fn new(embedder: E, synthesizer: S, index: V, config: RagConfig) -> Self {
        RagEngine {
            embedder,
            synthesizer,
            index,
            config,
        }
    }

    /// Answer one question from the indexed corpus.
    ///
    /// Empty questions are rejected before any external call. Embedding and
    /// synthesis failures are fatal to the request and keep their distinct
    /// error variants.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuery);
        }

        let query_embedding = self.embedder.embed(question).await?;

        let hits = self
            .index
            .search(&query_embedding, self.config.top_k)
            .await?;
        if hits.is_empty() {
            debug!("Index returned no chunks; answering from empty context");
        }

        let prompt = build_prompt(&hits, question);
        let raw = self.synthesizer.synthesize(&prompt).await?;

        Ok(Answer {
            text: raw.trim().to_string(),
        })
    }

    /// Interactive question loop over stdin; `exit` quits.
    ///
    /// Per-question failures are reported and the loop continues.
    pub async fn run_query_loop(&self) -> Result<()> {
        info!("Ready to answer questions. Type 'exit' to quit.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.to_lowercase() == "exit" {
                info!("Goodbye!");
                break;
            }

            match self.answer(question).await {
                Ok(answer) => println!("\n{}", answer.text),
                Err(e) => error!("{}", e),
            }
        }

        Ok(())
    }
}
