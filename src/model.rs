//! Core domain types shared across extraction, bias scoring, storage and
//! reranking.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Textual surface of a source file: everything a reader (or a naive
/// retriever) sees that carries no structural meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextualFeatures {
    pub docstrings: Vec<String>,
    pub comments: Vec<String>,
    pub identifiers: Vec<String>,
    pub variable_names: Vec<String>,
}

impl TextualFeatures {
    /// Total character count of docstrings.
    pub fn docstring_chars(&self) -> usize {
        self.docstrings.iter().map(|s| s.len()).sum()
    }

    /// Total character count of comments.
    pub fn comment_chars(&self) -> usize {
        self.comments.iter().map(|s| s.len()).sum()
    }
}

/// Structural signature of a source file, independent of naming and
/// commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFeatures {
    pub node_count: usize,
    /// Cyclomatic-style complexity; 1 for a straight-line file.
    pub complexity: usize,
    pub nesting_depth: usize,
    pub function_count: usize,
    pub class_count: usize,
}

impl Default for StructuralFeatures {
    fn default() -> Self {
        Self {
            node_count: 0,
            complexity: 1,
            nesting_depth: 0,
            function_count: 0,
            class_count: 0,
        }
    }
}

/// Oracle-derived features describing what the code does rather than what
/// it is called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticFeatures {
    pub embedding: Vec<f32>,
    pub functional_signature: String,
    pub behavior_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Default,
    Named,
    Namespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Direct,
    Method,
    Constructor,
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InheritanceKind {
    Extends,
    Implements,
    Mixin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Npm,
    Local,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRelation {
    pub from: String,
    pub to: String,
    pub symbols: Vec<String>,
    pub import_type: ImportKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRelation {
    pub from: String,
    pub symbol: String,
    pub export_type: ExportKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRelation {
    pub from: String,
    pub to: String,
    pub object: Option<String>,
    pub call_type: CallKind,
    pub line: usize,
    /// Enclosing function or method name, "global" at top level.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceRelation {
    pub from: String,
    pub to: String,
    pub kind: InheritanceKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRelation {
    pub from: String,
    pub to: String,
    pub dependency_type: DependencyKind,
    pub usage: Vec<String>,
}

/// A typed edge between a file and another file or external identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "lowercase")]
pub enum Relationship {
    Import(ImportRelation),
    Export(ExportRelation),
    Call(CallRelation),
    Inheritance(InheritanceRelation),
    Dependency(DependencyRelation),
}

impl Relationship {
    /// Edge type string used for storage and weight lookup.
    pub fn edge_type(&self) -> &'static str {
        match self {
            Relationship::Import(_) => "imports",
            Relationship::Export(_) => "exports",
            Relationship::Call(_) => "calls",
            Relationship::Inheritance(r) => match r.kind {
                InheritanceKind::Extends => "extends",
                InheritanceKind::Implements => "implements",
                // A mixin consumer uses the mixin without subtyping.
                InheritanceKind::Mixin => "uses",
            },
            Relationship::Dependency(_) => "depends_on",
        }
    }

    pub fn from_path(&self) -> &str {
        match self {
            Relationship::Import(r) => &r.from,
            Relationship::Export(r) => &r.from,
            Relationship::Call(r) => &r.from,
            Relationship::Inheritance(r) => &r.from,
            Relationship::Dependency(r) => &r.from,
        }
    }

    /// Edge target: a file path, or a symbol/module identifier for edges
    /// that do not point at a file.
    pub fn target(&self) -> &str {
        match self {
            Relationship::Import(r) => &r.to,
            Relationship::Export(r) => &r.symbol,
            Relationship::Call(r) => &r.to,
            Relationship::Inheritance(r) => &r.to,
            Relationship::Dependency(r) => &r.to,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Relationship::Import(r) => Some(r.line),
            Relationship::Export(r) => Some(r.line),
            Relationship::Call(r) => Some(r.line),
            Relationship::Inheritance(r) => Some(r.line),
            Relationship::Dependency(_) => None,
        }
    }
}

/// Default edge weight per relationship type. Callers may override when
/// storing an edge.
pub fn default_edge_weight(edge_type: &str) -> f64 {
    match edge_type {
        "imports" => 1.0,
        "extends" => 0.95,
        "calls" => 0.9,
        "implements" => 0.9,
        "exports" => 0.8,
        "uses" => 0.7,
        "depends_on" => 0.6,
        _ => 0.5,
    }
}

/// Full per-file representation: the unit stored and superseded by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRepresentation {
    pub path: String,
    pub content: String,
    pub textual: TextualFeatures,
    pub structural: StructuralFeatures,
    pub semantic: SemanticFeatures,
    pub relationships: Vec<Relationship>,
    pub bias_score: f64,
    pub augmented_embedding: Vec<f32>,
    pub last_modified: DateTime<Utc>,
}

impl CodeRepresentation {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            textual: TextualFeatures::default(),
            structural: StructuralFeatures::default(),
            semantic: SemanticFeatures::default(),
            relationships: Vec::new(),
            bias_score: 0.0,
            augmented_embedding: Vec::new(),
            last_modified: Utc::now(),
        }
    }
}

/// Read-only traversal view of a file reachable from a query target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedComponent {
    pub file_path: String,
    pub component_name: String,
    /// "file" for indexed paths, "external" for module/symbol identifiers.
    pub component_type: String,
    pub relationship_type: String,
    pub relevance_score: f64,
    pub distance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub weight: f64,
}

/// On-demand snapshot of the neighborhood around a primary node; derived
/// from the store's edge set at query time, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
    pub primary_node: String,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub max_depth_reached: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTraversalResult {
    pub related_components: Vec<RelatedComponent>,
    pub graph: RelationshipGraph,
    pub stats: TraversalStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_mapping() {
        let imp = Relationship::Import(ImportRelation {
            from: "/w/a.js".into(),
            to: "/w/b".into(),
            symbols: vec!["x".into()],
            import_type: ImportKind::Named,
            line: 1,
        });
        assert_eq!(imp.edge_type(), "imports");

        let mixin = Relationship::Inheritance(InheritanceRelation {
            from: "/w/a.py".into(),
            to: "Base".into(),
            kind: InheritanceKind::Mixin,
            line: 3,
        });
        assert_eq!(mixin.edge_type(), "uses");
        assert_eq!(default_edge_weight(mixin.edge_type()), 0.7);
    }

    #[test]
    fn test_default_weights_table() {
        assert_eq!(default_edge_weight("imports"), 1.0);
        assert_eq!(default_edge_weight("extends"), 0.95);
        assert_eq!(default_edge_weight("calls"), 0.9);
        assert_eq!(default_edge_weight("implements"), 0.9);
        assert_eq!(default_edge_weight("exports"), 0.8);
        assert_eq!(default_edge_weight("depends_on"), 0.6);
        assert_eq!(default_edge_weight("unknown"), 0.5);
    }

    #[test]
    fn test_relationship_serde_round_trip() {
        let rel = Relationship::Call(CallRelation {
            from: "/w/a.js".into(),
            to: "save".into(),
            object: Some("db".into()),
            call_type: CallKind::Method,
            line: 12,
            context: "handleRequest".into(),
        });
        let json = serde_json::to_string(&rel).unwrap();
        assert!(json.contains("\"relation\":\"call\""));
        let back: Relationship = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn test_structural_defaults() {
        let s = StructuralFeatures::default();
        assert_eq!(s.complexity, 1);
        assert_eq!(s.nesting_depth, 0);
    }
}
