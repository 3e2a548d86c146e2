//! Context-aware reranking.
//!
//! Fuses textual, semantic and functional similarity with the stored bias
//! score: the higher a candidate's bias, the less its textual match is
//! allowed to contribute. Also localizes the most relevant code regions
//! and renders graph context into human-readable explanations.
use serde::{Deserialize, Serialize};

use crate::model::{CodeRepresentation, RelatedComponent};

const TEXTUAL_BASE_WEIGHT: f64 = 0.2;
const SEMANTIC_WEIGHT: f64 = 0.5;
const FUNCTIONAL_WEIGHT: f64 = 0.3;

const REGION_SCORE_THRESHOLD: f64 = 0.3;
const MAX_REGIONS: usize = 3;
const MAX_CHAIN_TARGETS: usize = 3;

/// Curated synonym groups; a token matching only through its group scores
/// partial credit.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("search", &["find", "locate", "query", "filter", "lookup"]),
    ("find", &["search", "locate", "lookup"]),
    ("create", &["add", "insert", "make", "build", "new"]),
    ("delete", &["remove", "drop", "clear", "destroy"]),
    ("update", &["modify", "change", "edit", "set"]),
    ("read", &["get", "fetch", "load", "retrieve"]),
    ("write", &["save", "store", "persist"]),
    ("parse", &["analyze", "process", "extract", "tokenize"]),
    ("send", &["emit", "dispatch", "publish", "transmit"]),
    ("error", &["failure", "exception", "fault"]),
    ("test", &["verify", "check", "validate"]),
    ("sort", &["order", "rank"]),
    ("cache", &["memoize", "buffer"]),
];

const SYNONYM_CREDIT: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub textual: f64,
    pub semantic: f64,
    pub functional: f64,
    pub bias: f64,
}

/// A contiguous code block relevant to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRegion {
    pub start_line: usize,
    pub end_line: usize,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub file_path: String,
    pub combined_score: f64,
    pub scores: ScoreBreakdown,
    pub regions: Vec<CodeRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedRetrievalResult {
    #[serde(flatten)]
    pub result: RetrievalResult,
    pub related_components: Vec<RelatedComponent>,
    pub context_summary: String,
    pub dependency_chain: Vec<String>,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Rank candidates against the query and keep the top `top_k`.
pub fn rerank(
    candidates: &[CodeRepresentation],
    query: &str,
    top_k: usize,
) -> Vec<RetrievalResult> {
    let tokens = tokenize(query);

    let mut results: Vec<RetrievalResult> = candidates
        .iter()
        .map(|repr| {
            let scores = ScoreBreakdown {
                textual: textual_similarity(&tokens, repr),
                semantic: semantic_similarity(&tokens, repr),
                functional: functional_similarity(query, &tokens, repr),
                bias: repr.bias_score,
            };
            let combined_score = combine_scores(
                scores.textual,
                scores.semantic,
                scores.functional,
                scores.bias,
            );
            RetrievalResult {
                file_path: repr.path.clone(),
                combined_score,
                regions: localize(&repr.content, &tokens),
                scores,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    results.truncate(top_k);
    results
}

/// Weighted fusion. A biased candidate loses textual weight:
/// `0.2 × (1 − bias × 0.5)`, never gains it.
pub fn combine_scores(textual: f64, semantic: f64, functional: f64, bias: f64) -> f64 {
    let bias_adjustment = 1.0 - bias * 0.5;
    let textual_weight = TEXTUAL_BASE_WEIGHT * bias_adjustment;

    let weighted =
        textual * textual_weight + semantic * SEMANTIC_WEIGHT + functional * FUNCTIONAL_WEIGHT;
    let total_weight = textual_weight + SEMANTIC_WEIGHT + FUNCTIONAL_WEIGHT;
    weighted / total_weight
}

/// Fraction of query tokens literally present in the candidate's textual
/// surface.
fn textual_similarity(tokens: &[String], repr: &CodeRepresentation) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let mut haystack = String::with_capacity(repr.content.len() + 256);
    for group in [
        &repr.textual.docstrings,
        &repr.textual.comments,
        &repr.textual.identifiers,
        &repr.textual.variable_names,
    ] {
        for item in group {
            haystack.push_str(&item.to_lowercase());
            haystack.push(' ');
        }
    }
    haystack.push_str(&repr.content.to_lowercase());

    let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

/// Fraction of query tokens matching the functional description, with
/// partial credit for curated synonyms.
fn semantic_similarity(tokens: &[String], repr: &CodeRepresentation) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let haystack = format!(
        "{} {}",
        repr.semantic.functional_signature.to_lowercase(),
        repr.semantic.behavior_pattern.to_lowercase()
    );

    let score: f64 = tokens
        .iter()
        .map(|token| {
            if haystack.contains(token.as_str()) {
                return 1.0;
            }
            let synonyms = SYNONYMS
                .iter()
                .find(|(word, _)| word == token)
                .map(|(_, syns)| *syns)
                .unwrap_or(&[]);
            if synonyms.iter().any(|s| haystack.contains(s)) {
                SYNONYM_CREDIT
            } else {
                0.0
            }
        })
        .sum();
    (score / tokens.len() as f64).min(1.0)
}

/// Blend of complexity proximity and behavior-keyword overlap.
fn functional_similarity(query: &str, tokens: &[String], repr: &CodeRepresentation) -> f64 {
    let estimated = estimate_query_complexity(query);
    let candidate = scale_complexity(repr.structural.complexity);
    let proximity = 1.0 - (estimated as f64 - candidate as f64).abs() / 5.0;

    let behavior_tokens = tokenize(&repr.semantic.behavior_pattern);
    let overlap = if tokens.is_empty() {
        0.0
    } else {
        let hits = tokens
            .iter()
            .filter(|t| behavior_tokens.iter().any(|b| b == *t))
            .count();
        hits as f64 / tokens.len() as f64
    };

    0.5 * proximity + 0.5 * overlap
}

/// Keyword-derived complexity estimate on a 1–6 scale.
fn estimate_query_complexity(query: &str) -> usize {
    let lower = query.to_lowercase();
    let mut level: isize = 2;
    if ["simple", "basic", "trivial"].iter().any(|w| lower.contains(w)) {
        level -= 1;
    }
    if ["complex", "advanced", "intricate"].iter().any(|w| lower.contains(w)) {
        level += 2;
    }
    if ["algorithm", "recursive", "optimize", "concurrent", "parallel"]
        .iter()
        .any(|w| lower.contains(w))
    {
        level += 1;
    }
    level.clamp(1, 6) as usize
}

/// Candidate structural complexity mapped onto the same 1–6 scale.
fn scale_complexity(complexity: usize) -> usize {
    complexity.max(1).div_ceil(5).clamp(1, 6)
}

/// Scan for definition blocks and keep the top-scoring regions.
///
/// A block runs from its definition line to the first following non-blank
/// line whose indentation does not exceed the definition's.
pub fn localize(content: &str, tokens: &[String]) -> Vec<CodeRegion> {
    let lines: Vec<&str> = content.lines().collect();
    let mut regions = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(name) = definition_name(line) else {
            continue;
        };
        let indent = indent_of(line);

        let mut end = lines.len();
        for (next_idx, next_line) in lines.iter().enumerate().skip(idx + 1) {
            if next_line.trim().is_empty() {
                continue;
            }
            if indent_of(next_line) <= indent {
                end = next_idx;
                break;
            }
        }

        // Trim trailing blank lines out of the block bounds.
        let mut last = end;
        while last > idx + 1 && lines[last - 1].trim().is_empty() {
            last -= 1;
        }

        let block = lines[idx..last].join("\n").to_lowercase();
        let score = if tokens.is_empty() {
            0.0
        } else {
            tokens.iter().filter(|t| block.contains(t.as_str())).count() as f64
                / tokens.len() as f64
        };

        if score > REGION_SCORE_THRESHOLD {
            regions.push(CodeRegion {
                start_line: idx + 1,
                end_line: last,
                name,
                score,
            });
        }
    }

    regions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    regions.truncate(MAX_REGIONS);
    regions
}

const DEFINITION_MODIFIERS: &[&str] = &[
    "pub", "public", "private", "protected", "static", "async", "export", "default", "abstract",
    "final",
];

const DEFINITION_KEYWORDS: &[&str] = &[
    "function", "def", "fn", "func", "class", "impl", "trait", "struct", "interface", "enum",
];

/// Language-agnostic definition matcher on leading keywords.
fn definition_name(line: &str) -> Option<String> {
    let mut words = line.trim().split_whitespace().peekable();
    while let Some(word) = words.peek() {
        if DEFINITION_MODIFIERS.contains(word) {
            words.next();
        } else {
            break;
        }
    }
    let keyword = words.next()?;
    if !DEFINITION_KEYWORDS.contains(&keyword) {
        return None;
    }
    let name = words.next()?;
    let name: String = name
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Short natural-language summary of a result's graph neighborhood.
pub fn context_summary(components: &[RelatedComponent]) -> String {
    if components.is_empty() {
        return "no graph context available".to_string();
    }

    let imports = components
        .iter()
        .filter(|c| matches!(c.relationship_type.as_str(), "imports" | "depends_on"))
        .count();
    let calls = components
        .iter()
        .filter(|c| c.relationship_type == "calls")
        .count();
    let inheritance = components
        .iter()
        .filter(|c| matches!(c.relationship_type.as_str(), "extends" | "implements" | "uses"))
        .count();

    // Components arrive ranked, so the strongest link is first.
    let top = &components[0];
    format!(
        "{imports} import links, {calls} call links, {inheritance} inheritance links; \
         most related: {} ({}, relevance {:.2})",
        top.file_path, top.relationship_type, top.relevance_score
    )
}

/// Dependency chain: the candidate followed by its strongest import /
/// depends_on targets.
pub fn dependency_chain(path: &str, components: &[RelatedComponent]) -> Vec<String> {
    let mut chain = vec![path.to_string()];
    chain.extend(
        components
            .iter()
            .filter(|c| matches!(c.relationship_type.as_str(), "imports" | "depends_on"))
            .take(MAX_CHAIN_TARGETS)
            .map(|c| c.file_path.clone()),
    );
    chain
}
