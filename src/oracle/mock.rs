/// Mock oracle for testing purposes.
///
/// Generates deterministic embeddings based on text hash, so repeated
/// pipeline runs over unchanged files reproduce identical representations.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{CompletionModel, Embedder, OracleError};

/// A mock embedder that produces deterministic vectors from text hashes.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        // Seed deterministic float values from the text hash
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        let bytes = hash.to_le_bytes();
        let mut embedding = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            embedding.push(bytes[i % 8] as f32 / 255.0);
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A mock completion model that echoes a deterministic summary of the
/// prompt instead of calling out.
pub struct MockCompletionModel;

impl CompletionModel for MockCompletionModel {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        Ok(format!("mock-completion-{:016x}", hasher.finish()))
    }
}

/// An oracle that always fails, for exercising degradation paths.
pub struct FailingOracle;

impl Embedder for FailingOracle {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, OracleError> {
        Err(OracleError::EmbeddingFailed("mock failure".to_string()))
    }

    fn dimensions(&self) -> usize {
        0
    }
}

impl CompletionModel for FailingOracle {
    fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::CompletionFailed("mock failure".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(384);
        let result = embedder.embed("hello world").unwrap();
        assert_eq!(result.len(), 384);
    }

    #[test]
    fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("hello").unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("world").unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::new(384);
        let vec = embedder.embed("test normalization").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "vector should be approximately unit length, got {norm}"
        );
    }

    #[test]
    fn test_mock_embed_batch() {
        let embedder = MockEmbedder::new(128);
        let results = embedder.embed_batch(&["a", "b", "c"]).unwrap();
        assert_eq!(results.len(), 3);
        for vec in &results {
            assert_eq!(vec.len(), 128);
        }
    }

    #[test]
    fn test_mock_completion_deterministic() {
        let model = MockCompletionModel;
        let a = model.complete("describe this").unwrap();
        let b = model.complete("describe this").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("mock-completion-"));
    }

    #[test]
    fn test_failing_oracle() {
        assert!(FailingOracle.embed("x").is_err());
        assert!(FailingOracle.complete("x").is_err());
    }
}
