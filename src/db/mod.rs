//! Relationship graph store backed by SQLite and sqlite-vec.
//!
//! Representations and typed, weighted edges live in namespaced tables;
//! augmented embeddings go into a vec0 virtual table for cosine search.
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::info;

pub mod relations;
pub mod representations;
pub mod search;
pub mod traversal;

fn schema_sql(dimensions: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS representations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL,
    textual TEXT NOT NULL,
    structural TEXT NOT NULL,
    semantic TEXT NOT NULL,
    relationships TEXT NOT NULL,
    bias_score REAL NOT NULL DEFAULT 0.0,
    last_modified DATETIME NOT NULL,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(namespace, path)
);

CREATE INDEX IF NOT EXISTS idx_repr_namespace ON representations(namespace);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_representations USING vec0(
    embedding FLOAT[{dimensions}]
);

CREATE TABLE IF NOT EXISTS relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace TEXT NOT NULL,
    from_path TEXT NOT NULL,
    to_path TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL,
    line INTEGER,
    details TEXT
);

CREATE INDEX IF NOT EXISTS idx_rel_from ON relationships(namespace, from_path);
CREATE INDEX IF NOT EXISTS idx_rel_to ON relationships(namespace, to_path);
CREATE INDEX IF NOT EXISTS idx_rel_type ON relationships(edge_type);
"#
    )
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A namespaced SQLite connection initialized with sqlite-vec and the
/// application schema.
pub struct Db {
    pub(crate) conn: Connection,
    pub(crate) namespace: String,
    pub(crate) dimensions: usize,
}

impl Db {
    /// Open a database at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P, namespace: &str, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing graph store: {}", path.display());

        init_sqlite_vec();

        let conn = Connection::open(path)?;

        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimensions))?;

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            dimensions,
        })
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory(namespace: &str, dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimensions))?;
        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            dimensions,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Helper to serialize a float32 vector into bytes for the vec0 virtual
/// table.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
