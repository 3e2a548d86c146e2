//! Textual-bias detection.
//!
//! A file's structural signature is extracted twice: once from the original
//! content and once from a masked copy whose comments and docstrings are
//! blanked and whose identifiers are replaced by a fixed placeholder. The
//! bias score is the complement of the average per-metric similarity
//! between the two signatures.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractor::{self, heuristic};
use crate::model::{CodeRepresentation, StructuralFeatures};

const DOCSTRING_RATIO_THRESHOLD: f64 = 0.10;
const IDENTIFIER_SCORE_THRESHOLD: f64 = 0.70;
const COMMENT_RATIO_THRESHOLD: f64 = 0.15;

/// Placeholder substituted for every identifier during masking.
const PLACEHOLDER: &str = "x";

static IDENTIFIER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Structural keywords across the supported languages. These survive
/// masking so branching and definition constructs keep parsing.
const KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "do", "switch", "case", "match", "loop", "fn", "def",
    "func", "function", "class", "struct", "enum", "trait", "impl", "interface", "return",
    "break", "continue", "import", "from", "export", "default", "const", "let", "var", "pub",
    "use", "mod", "async", "await", "try", "catch", "except", "finally", "raise", "throw",
    "new", "in", "of", "and", "or", "not", "is", "None", "True", "False", "null", "undefined",
    "true", "false", "self", "this", "super", "static", "public", "private", "protected",
    "void", "package", "type", "extends", "implements", "pass", "yield", "go", "defer",
    "select", "range", "chan", "mut", "where", "when", "lambda", "with", "as", "require",
    "include", "module", "end", "then", "begin", "print",
];

/// A discrete signal that a file's retrieval relevance leans on text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasIndicator {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: f64,
    pub description: String,
}

/// Blank comment/docstring interiors and replace every non-keyword
/// identifier with [`PLACEHOLDER`]. Line structure and all other code
/// tokens are preserved, so structural constructs survive re-extraction.
pub fn mask_content(content: &str) -> String {
    let stripped = heuristic::strip_comments(content);
    IDENTIFIER_TOKEN
        .replace_all(&stripped, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            if KEYWORDS.contains(&word) {
                word.to_string()
            } else {
                PLACEHOLDER.to_string()
            }
        })
        .to_string()
}

fn metric_similarity(a: usize, b: usize) -> f64 {
    let (a, b) = (a as f64, b as f64);
    1.0 - (a - b).abs() / a.max(b).max(1.0)
}

fn structural_similarity(a: &StructuralFeatures, b: &StructuralFeatures) -> f64 {
    let sims = [
        metric_similarity(a.complexity, b.complexity),
        metric_similarity(a.nesting_depth, b.nesting_depth),
        metric_similarity(a.function_count, b.function_count),
        metric_similarity(a.class_count, b.class_count),
    ];
    sims.iter().sum::<f64>() / sims.len() as f64
}

/// Score how much this file's structural signature depends on its textual
/// surface. 0 = structure unchanged by masking, 1 = entirely text-borne.
pub fn detect_bias(repr: &CodeRepresentation) -> f64 {
    let masked = mask_content(&repr.content);
    let masked_extraction = extractor::extract(&masked, &repr.path, None);
    let similarity = structural_similarity(&repr.structural, &masked_extraction.structural);
    (1.0 - similarity).clamp(0.0, 1.0)
}

/// Independent threshold-based indicators over the textual surface.
pub fn indicators(repr: &CodeRepresentation) -> Vec<BiasIndicator> {
    let mut found = Vec::new();
    let content_chars = repr.content.len().max(1) as f64;

    let docstring_ratio = repr.textual.docstring_chars() as f64 / content_chars;
    if docstring_ratio > DOCSTRING_RATIO_THRESHOLD {
        found.push(BiasIndicator {
            kind: "docstring_dependency".to_string(),
            severity: docstring_ratio.min(1.0),
            description: format!(
                "docstrings make up {:.0}% of the file content",
                docstring_ratio * 100.0
            ),
        });
    }

    let identifier_score = identifier_complexity_score(repr);
    if identifier_score > IDENTIFIER_SCORE_THRESHOLD {
        found.push(BiasIndicator {
            kind: "identifier_complexity".to_string(),
            severity: identifier_score.min(1.0),
            description: "identifiers are long or heavily structured, carrying strong naming signal"
                .to_string(),
        });
    }

    let comment_ratio = repr.textual.comment_chars() as f64 / content_chars;
    if comment_ratio > COMMENT_RATIO_THRESHOLD {
        found.push(BiasIndicator {
            kind: "comment_dependency".to_string(),
            severity: comment_ratio.min(1.0),
            description: format!(
                "comments make up {:.0}% of the file content",
                comment_ratio * 100.0
            ),
        });
    }

    found
}

/// Average identifier length (normalized to 20 chars) blended with the
/// fraction of identifiers that are long, underscored, or camelCase.
fn identifier_complexity_score(repr: &CodeRepresentation) -> f64 {
    let names: Vec<&String> = repr
        .textual
        .identifiers
        .iter()
        .chain(repr.textual.variable_names.iter())
        .collect();
    if names.is_empty() {
        return 0.0;
    }

    let avg_len = names.iter().map(|n| n.len()).sum::<usize>() as f64 / names.len() as f64;
    let structured = names
        .iter()
        .filter(|n| n.len() > 8 || n.contains('_') || is_camel_case(n))
        .count() as f64
        / names.len() as f64;

    0.5 * (avg_len / 20.0).min(1.0) + 0.5 * structured
}

fn is_camel_case(name: &str) -> bool {
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            return true;
        }
        prev_lower = c.is_lowercase();
    }
    false
}
