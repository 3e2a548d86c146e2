//! Tree-sitter extraction strategy: one recursive walk collects textual
//! features, structural counters and relationship edges.
use std::collections::HashSet;

use tree_sitter::{Node, Parser};

use super::languages::LanguageSpec;
use super::{Extraction, RawImport, finish_imports};
use crate::model::{
    CallKind, CallRelation, ExportKind, ExportRelation, ImportKind, InheritanceKind,
    InheritanceRelation, Relationship, StructuralFeatures, TextualFeatures,
};

const CALL_BUILTINS: &[&str] = &[
    "len", "make", "append", "delete", "print", "println", "panic", "recover", "range", "str",
    "int", "isinstance", "super", "require",
];

/// Parse `content` with the given grammar and extract features. Returns
/// `None` when the parser cannot produce a tree, so the caller can fall
/// back to the heuristic strategy.
pub fn extract(content: &str, file_path: &str, spec: &LanguageSpec) -> Option<Extraction> {
    let mut parser = Parser::new();
    parser.set_language(&spec.language).ok()?;
    let tree = parser.parse(content, None)?;

    let mut collector = Collector {
        src: content.as_bytes(),
        spec,
        path: file_path,
        textual: TextualFeatures::default(),
        structural: StructuralFeatures::default(),
        relationships: Vec::new(),
        raw_imports: Vec::new(),
        fn_stack: Vec::new(),
        docstring_nodes: HashSet::new(),
        seen_calls: HashSet::new(),
    };
    collector.walk(tree.root_node(), 0);
    Some(collector.finish())
}

struct Collector<'a> {
    src: &'a [u8],
    spec: &'a LanguageSpec,
    path: &'a str,
    textual: TextualFeatures,
    structural: StructuralFeatures,
    relationships: Vec<Relationship>,
    raw_imports: Vec<RawImport>,
    fn_stack: Vec<String>,
    /// Python string nodes already classified as docstrings.
    docstring_nodes: HashSet<usize>,
    seen_calls: HashSet<(String, &'static str, String)>,
}

impl<'a> Collector<'a> {
    fn finish(mut self) -> Extraction {
        let mut relationships = self.relationships;
        relationships.extend(finish_imports(self.path, self.raw_imports));
        Extraction {
            textual: self.textual,
            structural: std::mem::take(&mut self.structural),
            relationships,
        }
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn line(&self, node: Node) -> usize {
        node.start_position().row + 1
    }

    fn context(&self) -> String {
        self.fn_stack
            .last()
            .cloned()
            .unwrap_or_else(|| "global".to_string())
    }

    fn walk(&mut self, node: Node, depth: usize) {
        let kind = node.kind();
        if node.is_named() {
            self.structural.node_count += 1;
        }

        if self.spec.comment_kinds.contains(&kind) {
            self.collect_comment(node);
        } else if kind == "string" && self.docstring_nodes.contains(&node.id()) {
            self.textual.docstrings.push(self.text(node));
        }

        if self.is_branch(node, kind) {
            self.structural.complexity += 1;
        }

        let mut child_depth = depth;
        if self.spec.nesting_kinds.contains(&kind) {
            child_depth += 1;
            if child_depth > self.structural.nesting_depth {
                self.structural.nesting_depth = child_depth;
            }
            self.mark_python_docstring(node);
        }
        if kind == "module" {
            self.mark_python_docstring(node);
        }

        let pushed_fn = if self.spec.function_kinds.contains(&kind) {
            self.structural.function_count += 1;
            let name = self.declared_name(node);
            if let Some(n) = &name {
                self.textual.identifiers.push(n.clone());
            }
            self.maybe_rust_export(node, name.as_deref());
            self.fn_stack
                .push(name.unwrap_or_else(|| "anonymous".to_string()));
            true
        } else {
            false
        };

        if self.spec.class_kinds.contains(&kind) {
            self.handle_class(node, kind);
        }

        self.handle_language_node(node, kind);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, child_depth);
        }

        if pushed_fn {
            self.fn_stack.pop();
        }
    }

    fn is_branch(&self, node: Node, kind: &str) -> bool {
        if self.spec.branch_kinds.contains(&kind) {
            return true;
        }
        match kind {
            "binary_expression" => matches!(
                node.child_by_field_name("operator")
                    .and_then(|o| o.utf8_text(self.src).ok()),
                Some("&&") | Some("||")
            ),
            "boolean_operator" => true,
            _ => false,
        }
    }

    fn collect_comment(&mut self, node: Node) {
        let text = self.text(node);
        let is_doc = match self.spec.name {
            "rust" => {
                text.starts_with("///")
                    || text.starts_with("//!")
                    || text.starts_with("/**")
                    || text.starts_with("/*!")
            }
            "javascript" | "typescript" => text.starts_with("/**"),
            _ => false,
        };
        if is_doc {
            self.textual.docstrings.push(text);
        } else {
            self.textual.comments.push(text);
        }
    }

    /// Python: the first statement of a module/function/class body, when it
    /// is a bare string, is a docstring.
    fn mark_python_docstring(&mut self, body: Node) {
        if self.spec.name != "python" {
            return;
        }
        if let Some(first) = body.named_child(0)
            && first.kind() == "expression_statement"
            && let Some(inner) = first.named_child(0)
            && inner.kind() == "string"
        {
            self.docstring_nodes.insert(inner.id());
        }
    }

    fn declared_name(&self, node: Node) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(self.text(name));
        }
        // Anonymous function forms take their binding's name.
        let parent = node.parent()?;
        match parent.kind() {
            "variable_declarator" => self.field_text(parent, "name"),
            "assignment_expression" | "assignment" => self.field_text(parent, "left"),
            "pair" => self.field_text(parent, "key"),
            _ => None,
        }
    }

    fn has_visibility_modifier(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .any(|c| c.kind() == "visibility_modifier")
    }

    fn maybe_rust_export(&mut self, node: Node, name: Option<&str>) {
        if self.spec.name != "rust" {
            return;
        }
        if let Some(name) = name
            && self.has_visibility_modifier(node)
        {
            let line = self.line(node);
            self.relationships
                .push(Relationship::Export(ExportRelation {
                    from: self.path.to_string(),
                    symbol: name.to_string(),
                    export_type: ExportKind::Named,
                    line,
                }));
        }
    }

    fn handle_class(&mut self, node: Node, kind: &str) {
        if self.spec.name == "go" {
            // Only struct/interface type declarations count as class-like.
            let mut cursor = node.walk();
            for spec_node in node.children(&mut cursor) {
                if spec_node.kind() != "type_spec" {
                    continue;
                }
                let is_class = spec_node
                    .child_by_field_name("type")
                    .map(|t| matches!(t.kind(), "struct_type" | "interface_type"))
                    .unwrap_or(false);
                if is_class {
                    self.structural.class_count += 1;
                    if let Some(name) = self.field_text(spec_node, "name") {
                        self.textual.identifiers.push(name);
                    }
                }
            }
            return;
        }

        self.structural.class_count += 1;
        let name = self.declared_name(node);
        if let Some(n) = &name {
            self.textual.identifiers.push(n.clone());
        }
        if self.spec.name == "rust" {
            self.maybe_rust_export(node, name.as_deref());
        }
        if self.spec.name == "python" && kind == "class_definition" {
            self.python_superclasses(node);
        }
    }

    fn python_superclasses(&mut self, node: Node) {
        let Some(args) = node.child_by_field_name("superclasses") else {
            return;
        };
        let line = self.line(node);
        let mut cursor = args.walk();
        for base in args.named_children(&mut cursor) {
            let to = self.text(base);
            if to.is_empty() {
                continue;
            }
            let kind = if to.ends_with("Mixin") {
                InheritanceKind::Mixin
            } else {
                InheritanceKind::Extends
            };
            self.relationships
                .push(Relationship::Inheritance(InheritanceRelation {
                    from: self.path.to_string(),
                    to,
                    kind,
                    line,
                }));
        }
    }

    fn handle_language_node(&mut self, node: Node, kind: &str) {
        match (self.spec.name, kind) {
            ("javascript" | "typescript", "import_statement") => self.js_import(node),
            ("javascript" | "typescript", "export_statement") => self.js_export(node),
            ("javascript" | "typescript", "call_expression") => self.js_call(node),
            ("javascript" | "typescript", "new_expression") => self.js_new(node),
            ("javascript" | "typescript", "variable_declarator") => {
                if let Some(name) = node.child_by_field_name("name")
                    && name.kind() == "identifier"
                {
                    let n = self.text(name);
                    self.textual.variable_names.push(n);
                }
            }
            ("javascript" | "typescript", "class_heritage") => self.js_heritage(node),
            ("typescript", "extends_clause") => self.ts_clause(node, InheritanceKind::Extends),
            ("typescript", "implements_clause") => {
                self.ts_clause(node, InheritanceKind::Implements)
            }
            ("python", "import_statement") => self.py_import(node),
            ("python", "import_from_statement") => self.py_import_from(node),
            ("python", "call") => self.py_call(node),
            ("python", "assignment") => {
                if let Some(left) = node.child_by_field_name("left")
                    && left.kind() == "identifier"
                {
                    let n = self.text(left);
                    self.textual.variable_names.push(n);
                }
            }
            ("rust", "use_declaration") => self.rust_use(node),
            ("rust", "call_expression") => self.rust_call(node),
            ("rust", "impl_item") => self.rust_impl(node),
            ("rust", "let_declaration") => {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.collect_identifiers_into_variables(pattern);
                }
            }
            ("go", "import_spec") => self.go_import(node),
            ("go", "call_expression") => self.go_call(node),
            ("go", "short_var_declaration") => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.collect_identifiers_into_variables(left);
                }
            }
            ("go", "var_spec") => {
                if let Some(name) = self.field_text(node, "name") {
                    self.textual.variable_names.push(name);
                }
            }
            _ => {}
        }
    }

    fn collect_identifiers_into_variables(&mut self, node: Node) {
        if node.kind() == "identifier" {
            let n = self.text(node);
            self.textual.variable_names.push(n);
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_identifiers_into_variables(child);
        }
    }

    fn push_call(&mut self, to: String, object: Option<String>, call_type: CallKind, line: usize) {
        if to.is_empty() || CALL_BUILTINS.contains(&to.as_str()) {
            return;
        }
        let context = self.context();
        let type_str = match call_type {
            CallKind::Direct => "direct",
            CallKind::Method => "method",
            CallKind::Constructor => "constructor",
            CallKind::Async => "async",
        };
        if !self.seen_calls.insert((to.clone(), type_str, context.clone())) {
            return;
        }
        self.relationships.push(Relationship::Call(CallRelation {
            from: self.path.to_string(),
            to,
            object,
            call_type,
            line,
            context,
        }));
    }

    fn is_awaited(node: Node) -> bool {
        node.parent()
            .map(|p| p.kind() == "await_expression" || p.kind() == "await")
            .unwrap_or(false)
    }

    // ── JavaScript / TypeScript ─────────────────────────────────────

    fn js_import(&mut self, node: Node) {
        let Some(source) = self.field_text(node, "source") else {
            return;
        };
        let specifier = source.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string();
        let line = self.line(node);

        let mut symbols = Vec::new();
        let mut kind = ImportKind::Default;
        let mut found_clause = false;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            found_clause = true;
            let mut inner = child.walk();
            for part in child.named_children(&mut inner) {
                match part.kind() {
                    "identifier" => {
                        symbols.push(self.text(part));
                    }
                    "named_imports" => {
                        kind = ImportKind::Named;
                        let mut specs = part.walk();
                        for spec_node in part.named_children(&mut specs) {
                            if spec_node.kind() == "import_specifier"
                                && let Some(name) = self.field_text(spec_node, "name")
                            {
                                symbols.push(name);
                            }
                        }
                    }
                    "namespace_import" => {
                        kind = ImportKind::Namespace;
                        let mut ns = part.walk();
                        for id in part.named_children(&mut ns) {
                            if id.kind() == "identifier" {
                                symbols.push(self.text(id));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // `import "./side-effect"` has no clause.
        if !found_clause {
            kind = ImportKind::Namespace;
        }

        self.raw_imports.push(RawImport {
            specifier,
            symbols,
            kind,
            line,
        });
    }

    fn js_export(&mut self, node: Node) {
        let line = self.line(node);
        let mut cursor = node.walk();
        let has_default = node.children(&mut cursor).any(|c| c.kind() == "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            // const/let declarations name their declarators, not themselves.
            let declarator_name = || {
                let mut cursor = decl.walk();
                decl.named_children(&mut cursor)
                    .find(|c| c.kind() == "variable_declarator")
                    .and_then(|d| self.field_text(d, "name"))
            };
            let symbol = self
                .field_text(decl, "name")
                .or_else(declarator_name)
                .unwrap_or_else(|| "default".to_string());
            let export_type = if has_default {
                ExportKind::Default
            } else {
                ExportKind::Named
            };
            self.relationships
                .push(Relationship::Export(ExportRelation {
                    from: self.path.to_string(),
                    symbol,
                    export_type,
                    line,
                }));
            return;
        }

        if has_default {
            self.relationships
                .push(Relationship::Export(ExportRelation {
                    from: self.path.to_string(),
                    symbol: "default".to_string(),
                    export_type: ExportKind::Default,
                    line,
                }));
            return;
        }

        // `export { a, b }` and `export * from "x"`.
        let mut found_named = false;
        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            if child.kind() == "export_clause" {
                let mut specs = child.walk();
                for spec_node in child.named_children(&mut specs) {
                    if spec_node.kind() == "export_specifier"
                        && let Some(name) = self.field_text(spec_node, "name")
                    {
                        found_named = true;
                        self.relationships
                            .push(Relationship::Export(ExportRelation {
                                from: self.path.to_string(),
                                symbol: name,
                                export_type: ExportKind::Named,
                                line,
                            }));
                    }
                }
            }
        }
        if !found_named
            && let Some(source) = self.field_text(node, "source")
        {
            let symbol = source
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string();
            self.relationships
                .push(Relationship::Export(ExportRelation {
                    from: self.path.to_string(),
                    symbol,
                    export_type: ExportKind::Namespace,
                    line,
                }));
        }
    }

    fn js_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line = self.line(node);

        match function.kind() {
            // Dynamic `import("./x")`.
            "import" => {
                if let Some(spec) = self.first_string_argument(node) {
                    self.raw_imports.push(RawImport {
                        specifier: spec,
                        symbols: Vec::new(),
                        kind: ImportKind::Dynamic,
                        line,
                    });
                }
            }
            "identifier" => {
                let name = self.text(function);
                // CommonJS require is an import, not a call.
                if name == "require" {
                    if let Some(spec) = self.first_string_argument(node) {
                        self.raw_imports.push(RawImport {
                            specifier: spec,
                            symbols: Vec::new(),
                            kind: ImportKind::Default,
                            line,
                        });
                    }
                    return;
                }
                let call_type = if Self::is_awaited(node) {
                    CallKind::Async
                } else {
                    CallKind::Direct
                };
                self.push_call(name, None, call_type, line);
            }
            "member_expression" => {
                let object = self.field_text(function, "object");
                let Some(property) = self.field_text(function, "property") else {
                    return;
                };
                let call_type = if Self::is_awaited(node) {
                    CallKind::Async
                } else {
                    CallKind::Method
                };
                self.push_call(property, object, call_type, line);
            }
            _ => {}
        }
    }

    fn js_new(&mut self, node: Node) {
        if let Some(ctor) = self.field_text(node, "constructor") {
            let line = self.line(node);
            self.push_call(ctor, None, CallKind::Constructor, line);
        }
    }

    fn first_string_argument(&self, call: Node) -> Option<String> {
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "string" {
                let text = self.text(arg);
                return Some(
                    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
                        .to_string(),
                );
            }
        }
        None
    }

    fn js_heritage(&mut self, node: Node) {
        let line = self.line(node);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            // TypeScript nests extends/implements clauses handled separately.
            if matches!(child.kind(), "extends_clause" | "implements_clause") {
                return;
            }
            let to = self.text(child);
            if !to.is_empty() {
                self.relationships
                    .push(Relationship::Inheritance(InheritanceRelation {
                        from: self.path.to_string(),
                        to,
                        kind: InheritanceKind::Extends,
                        line,
                    }));
            }
        }
    }

    fn ts_clause(&mut self, node: Node, kind: InheritanceKind) {
        let line = self.line(node);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let to = self.text(child);
            if !to.is_empty() {
                self.relationships
                    .push(Relationship::Inheritance(InheritanceRelation {
                        from: self.path.to_string(),
                        to,
                        kind,
                        line,
                    }));
            }
        }
    }

    // ── Python ──────────────────────────────────────────────────────

    fn py_import(&mut self, node: Node) {
        let line = self.line(node);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let module = match child.kind() {
                "dotted_name" => Some(self.text(child)),
                "aliased_import" => self.field_text(child, "name"),
                _ => None,
            };
            if let Some(module) = module {
                self.raw_imports.push(RawImport {
                    specifier: module,
                    symbols: Vec::new(),
                    kind: ImportKind::Namespace,
                    line,
                });
            }
        }
    }

    fn py_import_from(&mut self, node: Node) {
        let Some(module) = self.field_text(node, "module_name") else {
            return;
        };
        let line = self.line(node);
        let mut symbols = Vec::new();
        let mut kind = ImportKind::Named;

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" if self.text(child) != module => {
                    symbols.push(self.text(child));
                }
                "aliased_import" => {
                    if let Some(name) = self.field_text(child, "name") {
                        symbols.push(name);
                    }
                }
                "wildcard_import" => {
                    kind = ImportKind::Namespace;
                }
                _ => {}
            }
        }

        self.raw_imports.push(RawImport {
            specifier: module,
            symbols,
            kind,
            line,
        });
    }

    fn py_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line = self.line(node);
        match function.kind() {
            "identifier" => {
                let call_type = if Self::is_awaited(node) {
                    CallKind::Async
                } else {
                    CallKind::Direct
                };
                let name = self.text(function);
                self.push_call(name, None, call_type, line);
            }
            "attribute" => {
                let object = self.field_text(function, "object");
                let Some(attr) = self.field_text(function, "attribute") else {
                    return;
                };
                let call_type = if Self::is_awaited(node) {
                    CallKind::Async
                } else {
                    CallKind::Method
                };
                self.push_call(attr, object, call_type, line);
            }
            _ => {}
        }
    }

    // ── Rust ────────────────────────────────────────────────────────

    fn rust_use(&mut self, node: Node) {
        let Some(argument) = node.child_by_field_name("argument") else {
            return;
        };
        let text = self.text(argument);
        let line = self.line(node);

        let (specifier, symbols) = if let Some(idx) = text.find("::{") {
            let prefix = text[..idx].to_string();
            let inner = text[idx + 3..].trim_end_matches('}');
            let symbols = inner
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (prefix, symbols)
        } else {
            let leaf = text.rsplit("::").next().unwrap_or(&text).to_string();
            (text.clone(), vec![leaf])
        };

        self.raw_imports.push(RawImport {
            specifier,
            symbols,
            kind: ImportKind::Named,
            line,
        });
    }

    fn rust_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line = self.line(node);
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                self.push_call(name, None, CallKind::Direct, line);
            }
            "scoped_identifier" => {
                let text = self.text(function);
                let call_type = if text.ends_with("::new") {
                    CallKind::Constructor
                } else {
                    CallKind::Direct
                };
                self.push_call(text, None, call_type, line);
            }
            "field_expression" => {
                let object = self.field_text(function, "value");
                let Some(field) = self.field_text(function, "field") else {
                    return;
                };
                let call_type = if Self::is_awaited(node) {
                    CallKind::Async
                } else {
                    CallKind::Method
                };
                self.push_call(field, object, call_type, line);
            }
            _ => {}
        }
    }

    fn rust_impl(&mut self, node: Node) {
        let Some(trait_node) = node.child_by_field_name("trait") else {
            return;
        };
        let to = self.text(trait_node);
        if to.is_empty() {
            return;
        }
        let line = self.line(node);
        self.relationships
            .push(Relationship::Inheritance(InheritanceRelation {
                from: self.path.to_string(),
                to,
                kind: InheritanceKind::Implements,
                line,
            }));
    }

    // ── Go ──────────────────────────────────────────────────────────

    fn go_import(&mut self, node: Node) {
        let Some(path) = self.field_text(node, "path") else {
            return;
        };
        let line = self.line(node);
        self.raw_imports.push(RawImport {
            specifier: path.trim_matches('"').to_string(),
            symbols: Vec::new(),
            kind: ImportKind::Namespace,
            line,
        });
    }

    fn go_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line = self.line(node);
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                self.push_call(name, None, CallKind::Direct, line);
            }
            "selector_expression" => {
                let object = self.field_text(function, "operand");
                let Some(field) = self.field_text(function, "field") else {
                    return;
                };
                self.push_call(field, object, CallKind::Method, line);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_lang(content: &str, path: &str, lang: &str) -> Extraction {
        let spec = LanguageSpec::get_by_name(lang).unwrap();
        extract(content, path, &spec).expect("parse should succeed")
    }

    #[test]
    fn test_js_named_import_is_canonicalized() {
        let ex = extract_lang(
            "import { foo } from \"./bar\";\n",
            "/workspace/a.js",
            "javascript",
        );
        let import = ex
            .relationships
            .iter()
            .find_map(|r| match r {
                Relationship::Import(i) => Some(i),
                _ => None,
            })
            .expect("should extract one import");
        assert_eq!(import.from, "/workspace/a.js");
        assert_eq!(import.to, "/workspace/bar");
        assert_eq!(import.symbols, vec!["foo".to_string()]);
        assert_eq!(import.import_type, ImportKind::Named);
        assert_eq!(import.line, 1);
    }

    #[test]
    fn test_js_calls_record_enclosing_context() {
        let src = r#"
function handler() {
    validate();
    db.save();
}
startup();
"#;
        let ex = extract_lang(src, "/w/app.js", "javascript");
        let calls: Vec<&CallRelation> = ex
            .relationships
            .iter()
            .filter_map(|r| match r {
                Relationship::Call(c) => Some(c),
                _ => None,
            })
            .collect();

        let validate = calls.iter().find(|c| c.to == "validate").unwrap();
        assert_eq!(validate.context, "handler");
        assert_eq!(validate.call_type, CallKind::Direct);

        let save = calls.iter().find(|c| c.to == "save").unwrap();
        assert_eq!(save.object.as_deref(), Some("db"));
        assert_eq!(save.call_type, CallKind::Method);

        let startup = calls.iter().find(|c| c.to == "startup").unwrap();
        assert_eq!(startup.context, "global");
    }

    #[test]
    fn test_js_class_inheritance_and_export() {
        let src = "export default class Admin extends User {}\n";
        let ex = extract_lang(src, "/w/admin.js", "javascript");

        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Inheritance(i) if i.to == "User" && i.kind == InheritanceKind::Extends
        )));
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Export(e) if e.export_type == ExportKind::Default
        )));
        assert_eq!(ex.structural.class_count, 1);
    }

    #[test]
    fn test_python_docstring_and_superclass() {
        let src = r#""""Module doc."""

class Repo(Base, CacheMixin):
    """Repo doc."""

    def fetch(self):
        if self.ready and self.open:
            return load()
"#;
        let ex = extract_lang(src, "/w/repo.py", "python");
        assert_eq!(ex.textual.docstrings.len(), 2);
        assert_eq!(ex.structural.class_count, 1);
        assert_eq!(ex.structural.function_count, 1);

        let kinds: Vec<(String, InheritanceKind)> = ex
            .relationships
            .iter()
            .filter_map(|r| match r {
                Relationship::Inheritance(i) => Some((i.to.clone(), i.kind)),
                _ => None,
            })
            .collect();
        assert!(kinds.contains(&("Base".to_string(), InheritanceKind::Extends)));
        assert!(kinds.contains(&("CacheMixin".to_string(), InheritanceKind::Mixin)));

        // `if` plus the boolean `and` both branch.
        assert!(ex.structural.complexity >= 3);
    }

    #[test]
    fn test_rust_use_and_pub_export() {
        let src = r#"
use std::collections::{HashMap, HashSet};

pub struct Store;

impl Default for Store {
    fn default() -> Self {
        Store
    }
}
"#;
        let ex = extract_lang(src, "/w/store.rs", "rust");

        let import = ex
            .relationships
            .iter()
            .find_map(|r| match r {
                Relationship::Import(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(import.to, "std::collections");
        assert!(import.symbols.contains(&"HashMap".to_string()));
        assert!(import.symbols.contains(&"HashSet".to_string()));

        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Export(e) if e.symbol == "Store"
        )));
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Inheritance(i)
                if i.to == "Default" && i.kind == InheritanceKind::Implements
        )));
    }

    #[test]
    fn test_go_import_and_structs() {
        let src = r#"
package main

import "fmt"

type Server struct {
    addr string
}

func run() {
    fmt.Println("up")
}
"#;
        let ex = extract_lang(src, "/w/main.go", "go");
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Import(i) if i.to == "fmt"
        )));
        assert_eq!(ex.structural.class_count, 1);
        assert_eq!(ex.structural.function_count, 1);
        // Println survives the builtin filter, println does not.
        assert!(ex.relationships.iter().any(|r| matches!(
            r,
            Relationship::Call(c) if c.to == "Println" && c.object.as_deref() == Some("fmt")
        )));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let src = "import os\n\ndef work(x):\n    if x:\n        return os.getcwd()\n";
        let a = extract_lang(src, "/w/job.py", "python");
        let b = extract_lang(src, "/w/job.py", "python");
        assert_eq!(a.textual, b.textual);
        assert_eq!(a.structural, b.structural);
        assert_eq!(a.relationships, b.relationships);
    }
}
