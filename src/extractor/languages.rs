use tree_sitter::Language;

/// Per-language grammar plus the node-kind sets the AST walk cares about.
pub struct LanguageSpec {
    pub name: &'static str,
    pub language: Language,
    pub extensions: &'static [&'static str],
    pub function_kinds: &'static [&'static str],
    pub class_kinds: &'static [&'static str],
    pub branch_kinds: &'static [&'static str],
    pub nesting_kinds: &'static [&'static str],
    pub comment_kinds: &'static [&'static str],
}

impl LanguageSpec {
    pub fn get_all() -> Vec<LanguageSpec> {
        vec![
            rust_spec(),
            python_spec(),
            javascript_spec(),
            typescript_spec(),
            go_spec(),
        ]
    }

    pub fn get_by_extension(ext: &str) -> Option<LanguageSpec> {
        Self::get_all()
            .into_iter()
            .find(|s| s.extensions.contains(&ext))
    }

    pub fn get_by_name(name: &str) -> Option<LanguageSpec> {
        Self::get_all().into_iter().find(|s| s.name == name)
    }
}

fn rust_spec() -> LanguageSpec {
    LanguageSpec {
        name: "rust",
        language: tree_sitter_rust::LANGUAGE.into(),
        extensions: &["rs"],
        function_kinds: &["function_item"],
        class_kinds: &["struct_item", "enum_item", "trait_item"],
        branch_kinds: &[
            "if_expression",
            "match_arm",
            "for_expression",
            "while_expression",
            "loop_expression",
        ],
        nesting_kinds: &["block"],
        comment_kinds: &["line_comment", "block_comment"],
    }
}

fn python_spec() -> LanguageSpec {
    LanguageSpec {
        name: "python",
        language: tree_sitter_python::LANGUAGE.into(),
        extensions: &["py"],
        function_kinds: &["function_definition"],
        class_kinds: &["class_definition"],
        branch_kinds: &[
            "if_statement",
            "elif_clause",
            "for_statement",
            "while_statement",
            "except_clause",
            "case_clause",
            "conditional_expression",
        ],
        nesting_kinds: &["block"],
        comment_kinds: &["comment"],
    }
}

fn javascript_spec() -> LanguageSpec {
    LanguageSpec {
        name: "javascript",
        language: tree_sitter_javascript::LANGUAGE.into(),
        extensions: &["js", "jsx", "mjs", "cjs"],
        function_kinds: &[
            "function_declaration",
            "function_expression",
            "generator_function_declaration",
            "method_definition",
            "arrow_function",
        ],
        class_kinds: &["class_declaration"],
        branch_kinds: &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "switch_case",
            "catch_clause",
            "ternary_expression",
        ],
        nesting_kinds: &["statement_block", "class_body", "switch_body"],
        comment_kinds: &["comment"],
    }
}

fn typescript_spec() -> LanguageSpec {
    LanguageSpec {
        name: "typescript",
        language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        extensions: &["ts", "tsx"],
        function_kinds: &[
            "function_declaration",
            "function_expression",
            "generator_function_declaration",
            "method_definition",
            "arrow_function",
        ],
        class_kinds: &[
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
        ],
        branch_kinds: &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "switch_case",
            "catch_clause",
            "ternary_expression",
        ],
        nesting_kinds: &["statement_block", "class_body", "switch_body"],
        comment_kinds: &["comment"],
    }
}

fn go_spec() -> LanguageSpec {
    LanguageSpec {
        name: "go",
        language: tree_sitter_go::LANGUAGE.into(),
        extensions: &["go"],
        function_kinds: &["function_declaration", "method_declaration"],
        class_kinds: &["type_declaration"],
        branch_kinds: &[
            "if_statement",
            "for_statement",
            "expression_case",
            "type_case",
            "communication_case",
        ],
        nesting_kinds: &["block"],
        comment_kinds: &["comment"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_extension() {
        assert_eq!(LanguageSpec::get_by_extension("rs").unwrap().name, "rust");
        assert_eq!(LanguageSpec::get_by_extension("tsx").unwrap().name, "typescript");
        assert_eq!(LanguageSpec::get_by_extension("mjs").unwrap().name, "javascript");
        assert!(LanguageSpec::get_by_extension("java").is_none());
    }

    #[test]
    fn test_get_by_name() {
        assert!(LanguageSpec::get_by_name("python").is_some());
        assert!(LanguageSpec::get_by_name("cobol").is_none());
    }
}
