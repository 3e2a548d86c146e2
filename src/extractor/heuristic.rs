//! Regex and generic-pattern extraction strategies: the fallback path for
//! grammarless languages and for sources the AST parser rejects.
use std::sync::LazyLock;

use regex::Regex;

use super::{Extraction, RawImport, finish_imports};
use crate::model::{
    CallKind, CallRelation, ExportKind, ExportRelation, ImportKind, InheritanceKind,
    InheritanceRelation, Relationship, StructuralFeatures, TextualFeatures,
};

static KEYWORD_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:pub\s+|public\s+|private\s+|protected\s+|static\s+|async\s+|export\s+|default\s+)*(?:function|def|fn|func)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static C_LIKE_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:[A-Za-z_][\w<>\[\],\s\*&:]*\s+)+([A-Za-z_]\w*)\s*\([^;{}]*\)\s*\{")
        .unwrap()
});

static CLASS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+|public\s+|abstract\s+|final\s+|pub\s+)*(?:class|interface|struct|trait|enum)\s+([A-Za-z_]\w*)",
    )
    .unwrap()
});

static CLASS_EXTENDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+[A-Za-z_]\w*\s+(?:extends|:)\s+([A-Za-z_][\w:<>]*)").unwrap()
});

static CLASS_IMPLEMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"implements\s+([A-Za-z_][\w,\s]*)").unwrap());

static ES_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:([\w*{},\s]+)\s+from\s+)?["']([^"']+)["']"#).unwrap()
});

static PY_FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\s+([\w,\s*]+)").unwrap()
});

static PLAIN_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)\s*$").unwrap());

static REQUIRE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap());

static INCLUDE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*#include\s+[<"]([^>"]+)[>"]"#).unwrap());

static USE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*use\s+([\w:]+)(?:::\{([^}]*)\})?\s*;").unwrap());

static EXPORT_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+(default\s+)?(?:class|function|const|let|var|interface)?\s*([A-Za-z_]\w*)?")
        .unwrap()
});

static CALL_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)\s*\(").unwrap());

static VARIABLE_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:let|const|var|my)\s+(?:mut\s+)?([A-Za-z_]\w*)").unwrap()
});

static BRANCH_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|else\s+if|for|while|case|when|catch|except|match)\b|&&|\|\|")
        .unwrap()
});

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static TRIPLE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)(""".*?"""|'''.*?''')"#).unwrap());

/// Byte offset where a line comment starts, if any. `#include` and
/// shebang lines are directives, not comments.
fn line_comment_start(line: &str) -> Option<usize> {
    if let Some(i) = line.find("//") {
        return Some(i);
    }
    if let Some(i) = line.find('#') {
        let rest = &line[i..];
        if rest.starts_with("#include") || rest.starts_with("#!") {
            return None;
        }
        return Some(i);
    }
    None
}

static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").unwrap());

const CALL_KEYWORD_BLACKLIST: &[&str] = &[
    "if", "elif", "else", "for", "while", "switch", "match", "catch", "except", "return",
    "sizeof", "typeof", "function", "def", "fn", "func", "print", "println", "require",
    "import", "super", "new", "with", "assert",
];

/// Regex strategy: structured pattern extraction for C-like and
/// script-like sources.
pub fn extract_regex(content: &str, file_path: &str) -> Extraction {
    let mut textual = TextualFeatures::default();
    let mut structural = StructuralFeatures::default();
    let mut relationships: Vec<Relationship> = Vec::new();
    let mut raw_imports: Vec<RawImport> = Vec::new();

    collect_comments(content, &mut textual);

    // Strip comments and strings-as-docs before pattern matching so that
    // commented-out code does not produce phantom structure.
    let code = strip_comments(content);

    // Function and class definitions; keyword form wins over the C-like
    // form on the same line.
    let mut def_lines: Vec<(usize, String)> = Vec::new();
    for caps in KEYWORD_FN.captures_iter(&code) {
        let name = caps[1].to_string();
        let line = line_of(&code, caps.get(1).unwrap().start());
        textual.identifiers.push(name.clone());
        def_lines.push((line, name));
        structural.function_count += 1;
    }
    for caps in C_LIKE_FN.captures_iter(&code) {
        let name = caps[1].to_string();
        let line = line_of(&code, caps.get(1).unwrap().start());
        if def_lines.iter().any(|(l, _)| *l == line) {
            continue;
        }
        textual.identifiers.push(name.clone());
        def_lines.push((line, name));
        structural.function_count += 1;
    }
    def_lines.sort();

    for caps in CLASS_DEF.captures_iter(&code) {
        textual.identifiers.push(caps[1].to_string());
        structural.class_count += 1;
    }

    for caps in CLASS_EXTENDS.captures_iter(&code) {
        let line = line_of(&code, caps.get(1).unwrap().start());
        relationships.push(Relationship::Inheritance(InheritanceRelation {
            from: file_path.to_string(),
            to: caps[1].to_string(),
            kind: InheritanceKind::Extends,
            line,
        }));
    }
    for caps in CLASS_IMPLEMENTS.captures_iter(&code) {
        let line = line_of(&code, caps.get(1).unwrap().start());
        for to in caps[1].split(',') {
            let to = to.trim();
            if !to.is_empty() {
                relationships.push(Relationship::Inheritance(InheritanceRelation {
                    from: file_path.to_string(),
                    to: to.to_string(),
                    kind: InheritanceKind::Implements,
                    line,
                }));
            }
        }
    }

    collect_imports(&code, &mut raw_imports);

    for caps in EXPORT_DEF.captures_iter(&code) {
        let Some(symbol) = caps.get(2) else { continue };
        let line = line_of(&code, symbol.start());
        let export_type = if caps.get(1).is_some() {
            ExportKind::Default
        } else {
            ExportKind::Named
        };
        relationships.push(Relationship::Export(ExportRelation {
            from: file_path.to_string(),
            symbol: symbol.as_str().to_string(),
            export_type,
            line,
        }));
    }

    collect_calls(&code, file_path, &def_lines, &mut relationships);

    for caps in VARIABLE_DEF.captures_iter(&code) {
        textual.variable_names.push(caps[1].to_string());
    }

    structural.complexity = 1 + BRANCH_KEYWORD.find_iter(&code).count();
    structural.nesting_depth = indentation_depth(&code);
    structural.node_count = code.lines().filter(|l| !l.trim().is_empty()).count();

    relationships.extend(finish_imports(file_path, raw_imports));

    Extraction {
        textual,
        structural,
        relationships,
    }
}

/// Generic-pattern strategy: the last resort for unrecognized sources.
/// Yields zero-valued-but-present features, never fails.
pub fn extract_generic(content: &str, _file_path: &str) -> Extraction {
    let mut textual = TextualFeatures::default();
    let mut structural = StructuralFeatures::default();

    collect_comments(content, &mut textual);
    let code = strip_comments(content);

    let mut seen = std::collections::HashSet::new();
    for token in WORD_TOKEN.find_iter(&code) {
        let word = token.as_str();
        if seen.insert(word.to_string()) {
            textual.identifiers.push(word.to_string());
        }
    }

    structural.complexity = 1 + BRANCH_KEYWORD.find_iter(&code).count();
    structural.nesting_depth = indentation_depth(&code);
    structural.node_count = code.lines().filter(|l| !l.trim().is_empty()).count();

    Extraction {
        textual,
        structural,
        relationships: Vec::new(),
    }
}

fn collect_comments(content: &str, textual: &mut TextualFeatures) {
    for m in TRIPLE_QUOTE.find_iter(content) {
        textual.docstrings.push(m.as_str().to_string());
    }
    for m in BLOCK_COMMENT.find_iter(content) {
        let text = m.as_str().to_string();
        if text.starts_with("/**") {
            textual.docstrings.push(text);
        } else {
            textual.comments.push(text);
        }
    }
    for line in content.lines() {
        if let Some(i) = line_comment_start(line) {
            let text = &line[i..];
            if text.starts_with("///") || text.starts_with("//!") {
                textual.docstrings.push(text.to_string());
            } else {
                textual.comments.push(text.to_string());
            }
        }
    }
}

/// Blank comment interiors while preserving line structure, so that line
/// numbers and indentation survive.
pub fn strip_comments(content: &str) -> String {
    let mut out = content.to_string();
    for re in [&*TRIPLE_QUOTE, &*BLOCK_COMMENT] {
        out = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                caps[0]
                    .chars()
                    .map(|c| if c == '\n' { '\n' } else { ' ' })
                    .collect::<String>()
            })
            .to_string();
    }
    out.lines()
        .map(|line| match line_comment_start(line) {
            Some(i) => {
                let blank: String = line[i..].chars().map(|_| ' ').collect();
                format!("{}{}", &line[..i], blank)
            }
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_imports(code: &str, raw_imports: &mut Vec<RawImport>) {
    for caps in ES_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(2).unwrap().start());
        let specifier = caps[2].to_string();
        let (symbols, kind) = match caps.get(1) {
            Some(clause) => parse_es_clause(clause.as_str()),
            None => (Vec::new(), ImportKind::Namespace),
        };
        raw_imports.push(RawImport {
            specifier,
            symbols,
            kind,
            line,
        });
    }
    for caps in PY_FROM_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(1).unwrap().start());
        let symbols: Vec<String> = caps[2]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "*")
            .collect();
        raw_imports.push(RawImport {
            specifier: caps[1].to_string(),
            symbols,
            kind: ImportKind::Named,
            line,
        });
    }
    for caps in PLAIN_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(1).unwrap().start());
        raw_imports.push(RawImport {
            specifier: caps[1].to_string(),
            symbols: Vec::new(),
            kind: ImportKind::Namespace,
            line,
        });
    }
    for caps in REQUIRE_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(1).unwrap().start());
        raw_imports.push(RawImport {
            specifier: caps[1].to_string(),
            symbols: Vec::new(),
            kind: ImportKind::Default,
            line,
        });
    }
    for caps in INCLUDE_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(1).unwrap().start());
        raw_imports.push(RawImport {
            specifier: caps[1].to_string(),
            symbols: Vec::new(),
            kind: ImportKind::Namespace,
            line,
        });
    }
    for caps in USE_IMPORT.captures_iter(code) {
        let line = line_of(code, caps.get(1).unwrap().start());
        let symbols = match caps.get(2) {
            Some(list) => list
                .as_str()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec![
                caps[1]
                    .rsplit("::")
                    .next()
                    .unwrap_or(&caps[1])
                    .to_string(),
            ],
        };
        raw_imports.push(RawImport {
            specifier: caps[1].to_string(),
            symbols,
            kind: ImportKind::Named,
            line,
        });
    }
}

fn parse_es_clause(clause: &str) -> (Vec<String>, ImportKind) {
    let clause = clause.trim();
    if clause.starts_with('*') {
        let symbol = clause
            .rsplit(' ')
            .next()
            .unwrap_or_default()
            .to_string();
        return (vec![symbol], ImportKind::Namespace);
    }
    if let Some(start) = clause.find('{') {
        let inner = clause[start + 1..].trim_end_matches('}');
        let symbols = inner
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return (symbols, ImportKind::Named);
    }
    (vec![clause.to_string()], ImportKind::Default)
}

fn collect_calls(
    code: &str,
    file_path: &str,
    def_lines: &[(usize, String)],
    relationships: &mut Vec<Relationship>,
) {
    let mut seen = std::collections::HashSet::new();
    for caps in CALL_SITE.captures_iter(code) {
        let name = caps[2].to_string();
        if CALL_KEYWORD_BLACKLIST.contains(&name.as_str()) {
            continue;
        }
        // Skip the definition sites themselves.
        let line = line_of(code, caps.get(2).unwrap().start());
        if def_lines.iter().any(|(l, n)| *l == line && *n == name) {
            continue;
        }

        let object = caps.get(1).map(|m| m.as_str().to_string());
        let call_type = if object.is_some() {
            CallKind::Method
        } else {
            CallKind::Direct
        };
        // Context: the nearest definition above this line.
        let context = def_lines
            .iter()
            .rev()
            .find(|(l, _)| *l < line)
            .map(|(_, n)| n.clone())
            .unwrap_or_else(|| "global".to_string());

        if !seen.insert((name.clone(), object.clone(), context.clone())) {
            continue;
        }
        relationships.push(Relationship::Call(CallRelation {
            from: file_path.to_string(),
            to: name,
            object,
            call_type,
            line,
            context,
        }));
    }
}

fn line_of(content: &str, byte_offset: usize) -> usize {
    content[..byte_offset].matches('\n').count() + 1
}

/// Max indentation depth, one level per 4 leading columns (tab = 4).
fn indentation_depth(code: &str) -> usize {
    code.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            let cols: usize = l
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            cols / 4
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_java_like_source() {
        let src = r#"
public class OrderService implements Validator {
    // track orders
    public void submit(Order order) {
        if (order.isValid() && order.isOpen()) {
            repository.save(order);
        }
    }
}
"#;
        let ex = extract_regex(src, "/w/OrderService.java");
        assert_eq!(ex.structural.class_count, 1);
        assert!(ex.structural.function_count >= 1);
        assert!(ex.structural.complexity >= 3);
        assert!(ex.textual.identifiers.contains(&"OrderService".to_string()));
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Inheritance(i) if i.to == "Validator"
        )));
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Call(c) if c.to == "save" && c.object.as_deref() == Some("repository")
        )));
    }

    #[test]
    fn test_regex_import_forms() {
        let src = r#"
import { alpha, beta } from "./shared";
const lib = require("lodash");
#include <stdio.h>
"#;
        let ex = extract_regex(src, "/w/mixed.txt");
        let imports: Vec<_> = ex
            .relationships
            .iter()
            .filter_map(|r| match r {
                Relationship::Import(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(imports.len(), 3);
        assert!(imports.iter().any(|i| i.to == "/w/shared"
            && i.symbols == vec!["alpha".to_string(), "beta".to_string()]));
        assert!(imports.iter().any(|i| i.to == "lodash"));
        assert!(imports.iter().any(|i| i.to == "stdio.h"));
    }

    #[test]
    fn test_strip_comments_preserves_lines() {
        let src = "code();\n// comment line\nmore();\n";
        let stripped = strip_comments(src);
        assert_eq!(stripped.lines().count(), src.lines().count());
        assert!(!stripped.contains("comment"));
        assert!(stripped.contains("code();"));
    }

    #[test]
    fn test_generic_never_fails_on_noise() {
        let ex = extract_generic("\u{0}\u{1}?? !!", "/w/blob.bin");
        assert_eq!(ex.structural.complexity, 1);
        assert!(ex.relationships.is_empty());

        let ex = extract_generic("", "/w/empty.xyz");
        assert_eq!(ex.structural.node_count, 0);
        assert_eq!(ex.structural.nesting_depth, 0);
    }

    #[test]
    fn test_indentation_depth() {
        let code = "a\n    b\n        c\n";
        assert_eq!(indentation_depth(code), 2);
        assert_eq!(indentation_depth("flat\n"), 0);
        assert_eq!(indentation_depth("\tindented\n"), 1);
    }

    #[test]
    fn test_commented_out_code_is_ignored() {
        let src = "// if (x && y) { run(); }\nwork();\n";
        let ex = extract_regex(src, "/w/a.c");
        assert_eq!(ex.structural.complexity, 1);
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Call(c) if c.to == "work"
        )));
        assert!(!ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Call(c) if c.to == "run"
        )));
    }
}
