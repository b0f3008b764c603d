pub mod chunking;
pub mod database;
pub mod error;
pub mod gemini;
pub mod ingestion;
pub mod loader;
pub mod providers;
pub mod rag;

#[cfg(test)]
pub(crate) mod testutil;
