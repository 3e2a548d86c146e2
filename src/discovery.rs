/// File discovery collaborator: enumerates source files under a root and
/// reads their contents.
use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Compile the skip-list into a glob set; entries are directory names or
/// glob patterns matched against individual path components. Invalid
/// patterns are skipped.
fn build_exclusions(excluded_dirs: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in excluded_dirs {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => debug!("Ignoring invalid exclusion pattern {pattern:?}: {e}"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Lists source files under `root`, filtered by extension and skip-list.
///
/// Respects .gitignore (via the walker), skips dependency/build/test
/// directories, and returns sorted, deduplicated forward-slash paths.
pub fn list_source_files(
    root: &Path,
    extensions: &[String],
    excluded_dirs: &[String],
) -> Result<Vec<String>, DiscoveryError> {
    let exclusions = build_exclusions(excluded_dirs);
    let walker = WalkBuilder::new(root).hidden(false).build();

    // BTreeSet gives sorted + deduplicated output in one pass.
    let mut files = BTreeSet::new();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let excluded = path
            .components()
            .any(|c| exclusions.is_match(Path::new(c.as_os_str())));
        if excluded {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !extensions.iter().any(|e| e == &ext) {
            continue;
        }

        // Store forward-slash paths for cross-platform key consistency.
        files.insert(path.to_string_lossy().replace('\\', "/"));
    }

    debug!("Discovered {} source files under {}", files.len(), root.display());
    Ok(files.into_iter().collect())
}

/// Reads a file as UTF-8 text, surfacing a not-found condition distinctly.
pub fn read_file(path: &Path) -> Result<String, DiscoveryError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            DiscoveryError::NotFound(path.display().to_string())
        } else {
            DiscoveryError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["rs".to_string(), "js".to_string(), "py".to_string()]
    }

    fn excluded() -> Vec<String> {
        vec!["node_modules".to_string(), "tests".to_string()]
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("a.js"), "const a = 1;").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes").unwrap();

        let nested = dir.path().join("node_modules/pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("index.js"), "module.exports = {}").unwrap();

        let tests_dir = dir.path().join("tests");
        fs::create_dir_all(&tests_dir).unwrap();
        fs::write(tests_dir.join("a_test.py"), "def test_a(): pass").unwrap();

        let files = list_source_files(dir.path(), &exts(), &excluded()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.js"));
        assert!(files[1].ends_with("b.rs"));
    }

    #[test]
    fn test_glob_exclusion_patterns() {
        let dir = tempdir().unwrap();
        let generated = dir.path().join("gen_v2");
        fs::create_dir_all(&generated).unwrap();
        fs::write(generated.join("out.rs"), "fn g() {}").unwrap();
        fs::write(dir.path().join("keep.rs"), "fn k() {}").unwrap();

        let excluded = vec!["gen_*".to_string()];
        let files = list_source_files(dir.path(), &exts(), &excluded).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.rs"));
    }

    #[test]
    fn test_list_deduplicates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("only.py"), "x = 1").unwrap();
        let files = list_source_files(dir.path(), &exts(), &excluded()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_read_file_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.rs");
        match read_file(&missing) {
            Err(DiscoveryError::NotFound(p)) => assert!(p.contains("missing.rs")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_read_file_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.rs");
        fs::write(&path, "fn main() {}").unwrap();
        assert_eq!(read_file(&path).unwrap(), "fn main() {}");
    }
}
