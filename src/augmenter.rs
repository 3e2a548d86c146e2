//! Semantic augmentation via the oracle ports.
//!
//! Builds a structure-emphasizing embedding from a synthetic description of
//! the file's structural metrics and oracle-described behavior, then blends
//! it with the base content embedding. Identifiers and comments are
//! deliberately excluded from the semantic side so the result favors
//! structure over text.
use std::sync::Arc;

use tracing::warn;

use crate::model::CodeRepresentation;
use crate::oracle::{CompletionModel, Embedder};

/// Base/semantic blend: the semantic side dominates.
const BASE_WEIGHT: f32 = 0.3;
const SEMANTIC_WEIGHT: f32 = 0.7;

/// Upper bound on code characters sent to the completion oracle.
const MAX_PROMPT_CODE_CHARS: usize = 6000;

const SIGNATURE_FALLBACK: &str = "functional signature unavailable (oracle error)";
const BEHAVIOR_FALLBACK: &str = "behavior analysis unavailable (oracle error)";

pub struct Augmenter {
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn CompletionModel>,
}

impl Augmenter {
    pub fn new(embedder: Arc<dyn Embedder>, completer: Arc<dyn CompletionModel>) -> Self {
        Self {
            embedder,
            completer,
        }
    }

    /// Populate semantic features and the augmented embedding.
    ///
    /// Oracle failures degrade to placeholder text and partial embeddings;
    /// the returned representation is always usable.
    pub fn augment(&self, mut repr: CodeRepresentation) -> CodeRepresentation {
        let base = match self.embedder.embed(&repr.content) {
            Ok(v) => v,
            Err(e) => {
                warn!("Base embedding failed for {}: {e}", repr.path);
                Vec::new()
            }
        };

        repr.semantic.functional_signature = self.describe(
            &repr.content,
            "Describe the functional signature of this code: its inputs, outputs, and the \
             operations it performs. Ignore all identifier names, comments and docstrings; \
             describe only what the code does.",
            SIGNATURE_FALLBACK,
            &repr.path,
        );
        repr.semantic.behavior_pattern = self.describe(
            &repr.content,
            "Summarize the behavioral pattern of this code in one or two sentences (for \
             example: data transformation, event handling, caching, persistence, \
             orchestration). Ignore all identifier names and comments; judge only the \
             structure and control flow.",
            BEHAVIOR_FALLBACK,
            &repr.path,
        );

        let description = structural_description(&repr);
        let semantic = match self.embedder.embed(&description) {
            Ok(v) => v,
            Err(e) => {
                warn!("Semantic embedding failed for {}: {e}", repr.path);
                Vec::new()
            }
        };

        repr.augmented_embedding = combine_embeddings(&base, &semantic);
        repr.semantic.embedding = semantic;
        repr
    }

    fn describe(&self, content: &str, instruction: &str, fallback: &str, path: &str) -> String {
        let code: String = content.chars().take(MAX_PROMPT_CODE_CHARS).collect();
        let prompt = format!("{instruction}\n\n{code}");
        match self.completer.complete(&prompt) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Completion failed for {path}: {e}");
                fallback.to_string()
            }
        }
    }
}

/// Synthetic description of the structural metrics plus oracle-described
/// behavior. No raw identifiers or comments appear here.
fn structural_description(repr: &CodeRepresentation) -> String {
    let s = &repr.structural;
    format!(
        "code unit with complexity {}, nesting depth {}, {} functions, {} classes, {} nodes. \
         behavior: {}. signature: {}",
        s.complexity,
        s.nesting_depth,
        s.function_count,
        s.class_count,
        s.node_count,
        repr.semantic.behavior_pattern,
        repr.semantic.functional_signature,
    )
}

/// Pointwise `0.3·base + 0.7·semantic`; missing dimensions are zero and
/// the output length is the longer of the two inputs.
pub fn combine_embeddings(base: &[f32], semantic: &[f32]) -> Vec<f32> {
    let len = base.len().max(semantic.len());
    (0..len)
        .map(|i| {
            let b = base.get(i).copied().unwrap_or(0.0);
            let s = semantic.get(i).copied().unwrap_or(0.0);
            BASE_WEIGHT * b + SEMANTIC_WEIGHT * s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::{FailingOracle, MockCompletionModel, MockEmbedder};

    fn sample_repr() -> CodeRepresentation {
        let mut repr = CodeRepresentation::new("/w/a.py", "def f():\n    return 1\n");
        repr.structural.function_count = 1;
        repr
    }

    #[test]
    fn test_augment_populates_semantics() {
        let augmenter = Augmenter::new(
            Arc::new(MockEmbedder::default()),
            Arc::new(MockCompletionModel),
        );
        let repr = augmenter.augment(sample_repr());

        assert_eq!(repr.augmented_embedding.len(), 384);
        assert_eq!(repr.semantic.embedding.len(), 384);
        assert!(repr.semantic.functional_signature.starts_with("mock-completion-"));
        assert!(repr.semantic.behavior_pattern.starts_with("mock-completion-"));
    }

    #[test]
    fn test_augment_is_deterministic() {
        let augmenter = Augmenter::new(
            Arc::new(MockEmbedder::default()),
            Arc::new(MockCompletionModel),
        );
        let a = augmenter.augment(sample_repr());
        let b = augmenter.augment(sample_repr());
        assert_eq!(a.augmented_embedding, b.augmented_embedding);
        assert_eq!(a.semantic, b.semantic);
    }

    #[test]
    fn test_oracle_failure_degrades_not_fails() {
        let augmenter = Augmenter::new(Arc::new(FailingOracle), Arc::new(FailingOracle));
        let repr = augmenter.augment(sample_repr());

        assert_eq!(repr.semantic.functional_signature, SIGNATURE_FALLBACK);
        assert_eq!(repr.semantic.behavior_pattern, BEHAVIOR_FALLBACK);
        assert!(repr.augmented_embedding.is_empty());
    }

    #[test]
    fn test_combine_embeddings_weights() {
        let combined = combine_embeddings(&[1.0, 1.0], &[0.0, 1.0]);
        assert!((combined[0] - 0.3).abs() < 1e-6);
        assert!((combined[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_combine_embeddings_length_mismatch() {
        let combined = combine_embeddings(&[1.0], &[1.0, 1.0, 1.0]);
        assert_eq!(combined.len(), 3);
        assert!((combined[0] - 1.0).abs() < 1e-6);
        // Missing base dimensions count as zero.
        assert!((combined[1] - 0.7).abs() < 1e-6);
        assert!((combined[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_combine_embeddings_empty() {
        assert!(combine_embeddings(&[], &[]).is_empty());
    }
}
