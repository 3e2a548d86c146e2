//! Multi-language feature extraction.
//!
//! Three strategies, selected by normalized file extension: tree-sitter AST
//! walking for grammared languages, regex patterns for C-like/script
//! sources, and generic token heuristics for everything else. Extraction
//! never fails: an AST parse failure falls back to the regex path, and the
//! heuristic paths always yield zero-valued, non-null features.
pub mod ast;
pub mod heuristic;
pub mod languages;

use std::collections::HashMap;

use tracing::debug;

use crate::model::{
    DependencyKind, DependencyRelation, ImportKind, ImportRelation, Relationship,
    StructuralFeatures, TextualFeatures,
};
use languages::LanguageSpec;

/// Extraction output: the three feature groups of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub textual: TextualFeatures,
    pub structural: StructuralFeatures,
    pub relationships: Vec<Relationship>,
}

/// An import site before canonicalization; strategies collect these and
/// [`finish_imports`] turns them into import + dependency edges.
pub(crate) struct RawImport {
    pub specifier: String,
    pub symbols: Vec<String>,
    pub kind: ImportKind,
    pub line: usize,
}

const REGEX_EXTENSIONS: &[&str] = &[
    "java", "c", "cpp", "cc", "h", "hpp", "cs", "rb", "php", "swift", "kt", "scala", "m",
];

/// Modules resolved by a runtime or standard library rather than a package
/// registry.
const BUILTIN_MODULES: &[&str] = &[
    // node
    "fs", "path", "os", "http", "https", "crypto", "util", "events", "stream", "url",
    "child_process", "net", "zlib", "buffer", "assert", "querystring", "readline",
    // python
    "sys", "re", "json", "math", "time", "datetime", "collections", "itertools", "functools",
    "typing", "pathlib", "subprocess", "logging", "unittest", "io", "abc", "asyncio",
    // rust
    "std", "core", "alloc",
    // go
    "fmt", "strings", "strconv", "context", "errors", "sync", "encoding", "bytes", "bufio",
    "sort", "regexp", "log",
];

/// Extract textual, structural and relationship features from `content`.
///
/// `language_hint` overrides extension dispatch when supplied (e.g. for
/// extensionless files the caller already classified).
pub fn extract(content: &str, file_path: &str, language_hint: Option<&str>) -> Extraction {
    let ext = normalized_extension(file_path);

    let spec = language_hint
        .and_then(LanguageSpec::get_by_name)
        .or_else(|| LanguageSpec::get_by_extension(&ext));

    if let Some(spec) = spec {
        if let Some(extraction) = ast::extract(content, file_path, &spec) {
            return extraction;
        }
        debug!("AST parse failed for {file_path}, falling back to regex strategy");
        return heuristic::extract_regex(content, file_path);
    }

    if REGEX_EXTENSIONS.contains(&ext.as_str()) {
        return heuristic::extract_regex(content, file_path);
    }

    heuristic::extract_generic(content, file_path)
}

fn normalized_extension(file_path: &str) -> String {
    std::path::Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Canonicalize a relative import specifier against the importing file's
/// directory. Non-relative specifiers are returned verbatim as external
/// identifiers. Pure lexical normalization, no filesystem access.
pub fn resolve_import(from_path: &str, specifier: &str) -> String {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return specifier.to_string();
    }

    let dir = match from_path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };

    let mut parts: Vec<&str> = dir.split('/').collect();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(&"") | None) {
                    // Already at the root; keep it rather than escape.
                } else {
                    parts.pop();
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn dependency_kind(specifier: &str) -> DependencyKind {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        return DependencyKind::Local;
    }
    let head = specifier
        .split(['/', '.'])
        .next()
        .unwrap_or(specifier)
        .split("::")
        .next()
        .unwrap_or(specifier);
    if BUILTIN_MODULES.contains(&head) {
        DependencyKind::Builtin
    } else {
        DependencyKind::Npm
    }
}

/// Convert collected import sites into canonicalized import edges plus
/// per-target dependency edges with merged symbol usage.
pub(crate) fn finish_imports(file_path: &str, raws: Vec<RawImport>) -> Vec<Relationship> {
    let mut relationships = Vec::with_capacity(raws.len() * 2);
    // Insertion-ordered dependency merge keyed by resolved target.
    let mut dep_order: Vec<String> = Vec::new();
    let mut deps: HashMap<String, (DependencyKind, Vec<String>)> = HashMap::new();

    for raw in raws {
        let to = resolve_import(file_path, &raw.specifier);
        let kind = dependency_kind(&raw.specifier);

        relationships.push(Relationship::Import(ImportRelation {
            from: file_path.to_string(),
            to: to.clone(),
            symbols: raw.symbols.clone(),
            import_type: raw.kind,
            line: raw.line,
        }));

        let entry = deps.entry(to.clone()).or_insert_with(|| {
            dep_order.push(to);
            (kind, Vec::new())
        });
        for symbol in raw.symbols {
            if !entry.1.contains(&symbol) {
                entry.1.push(symbol);
            }
        }
    }

    for to in dep_order {
        let (dependency_type, usage) = deps.remove(&to).unwrap_or_default();
        relationships.push(Relationship::Dependency(DependencyRelation {
            from: file_path.to_string(),
            to,
            dependency_type,
            usage,
        }));
    }

    relationships
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_import_relative() {
        assert_eq!(resolve_import("/workspace/a.js", "./bar"), "/workspace/bar");
        assert_eq!(
            resolve_import("/workspace/src/a.js", "../lib/util"),
            "/workspace/lib/util"
        );
        assert_eq!(
            resolve_import("/workspace/a.js", "./sub/./mod"),
            "/workspace/sub/mod"
        );
    }

    #[test]
    fn test_resolve_import_external_verbatim() {
        assert_eq!(resolve_import("/workspace/a.js", "lodash"), "lodash");
        assert_eq!(resolve_import("/workspace/a.py", "os.path"), "os.path");
        assert_eq!(
            resolve_import("/workspace/a.rs", "std::collections"),
            "std::collections"
        );
    }

    #[test]
    fn test_resolve_import_does_not_escape_root() {
        assert_eq!(resolve_import("/a.js", "../../x"), "/x");
    }

    #[test]
    fn test_dependency_kind_classification() {
        assert_eq!(dependency_kind("./bar"), DependencyKind::Local);
        assert_eq!(dependency_kind("../x/y"), DependencyKind::Local);
        assert_eq!(dependency_kind("fs"), DependencyKind::Builtin);
        assert_eq!(dependency_kind("os.path"), DependencyKind::Builtin);
        assert_eq!(dependency_kind("std::fmt"), DependencyKind::Builtin);
        assert_eq!(dependency_kind("lodash"), DependencyKind::Npm);
        assert_eq!(dependency_kind("@scope/pkg"), DependencyKind::Npm);
    }

    #[test]
    fn test_finish_imports_merges_dependency_usage() {
        let raws = vec![
            RawImport {
                specifier: "./util".to_string(),
                symbols: vec!["a".to_string()],
                kind: ImportKind::Named,
                line: 1,
            },
            RawImport {
                specifier: "./util".to_string(),
                symbols: vec!["b".to_string(), "a".to_string()],
                kind: ImportKind::Named,
                line: 2,
            },
        ];
        let rels = finish_imports("/w/main.js", raws);

        let deps: Vec<_> = rels
            .iter()
            .filter_map(|r| match r {
                Relationship::Dependency(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].to, "/w/util");
        assert_eq!(deps[0].dependency_type, DependencyKind::Local);
        assert_eq!(deps[0].usage, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_dispatch_unknown_extension_uses_generic() {
        let ex = extract("some plain text with words", "/w/notes.xyz", None);
        assert!(ex.relationships.is_empty());
        assert!(!ex.textual.identifiers.is_empty());
    }

    #[test]
    fn test_dispatch_honors_language_hint() {
        let ex = extract("def f():\n    pass\n", "/w/script", Some("python"));
        assert_eq!(ex.structural.function_count, 1);
    }

    #[test]
    fn test_malformed_input_never_panics() {
        // Valid-extension file with garbage content still yields features.
        let ex = extract("$$$ %%% {{{", "/w/broken.js", None);
        assert!(ex.structural.complexity >= 1);

        let ex = extract("", "/w/empty.py", None);
        assert_eq!(ex.structural.function_count, 0);
    }
}
