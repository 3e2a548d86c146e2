/// Capability ports for the external embedding/completion oracle.
///
/// The augmenter is the only consumer; everything else stays oracle-free so
/// deterministic tests can inject the mock implementations.
pub mod http;
pub mod mock;

use thiserror::Error;

/// Errors that can occur talking to the oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("completion failed: {0}")]
    CompletionFailed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, OracleError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Trait for text completion implementations.
pub trait CompletionModel: Send + Sync {
    /// Complete a prompt into free text.
    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}
