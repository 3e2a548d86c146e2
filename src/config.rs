/// Configuration module for structrag.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./structrag.db".to_string()
}

fn default_source_extensions() -> Vec<String> {
    ["rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "cpp", "h", "rb", "php"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_dirs() -> Vec<String> {
    [
        "node_modules",
        "target",
        "dist",
        "build",
        "vendor",
        "venv",
        ".git",
        "__pycache__",
        "test",
        "tests",
        "__tests__",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_concurrency() -> usize {
    4
}

fn default_bias_threshold() -> f64 {
    0.5
}

fn default_search_top_k() -> usize {
    10
}

fn default_max_depth() -> usize {
    3
}

fn default_min_relevance() -> f64 {
    0.1
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_embed_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Repository root; every processed or updated path must resolve
    /// under it.
    pub repository_root: String,

    /// Store namespace. Defaults to the root's directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Worker-pool size for repository-wide processing.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Files scoring above this count as bias-detected in aggregates.
    #[serde(default = "default_bias_threshold")]
    pub bias_threshold: f64,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default = "default_max_depth")]
    pub max_traversal_depth: usize,

    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f64,

    #[serde(default)]
    pub oracle: OracleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key; read at client build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            repository_root: ".".to_string(),
            namespace: None,
            db_path: default_db_path(),
            source_extensions: default_source_extensions(),
            excluded_dirs: default_excluded_dirs(),
            concurrency: default_concurrency(),
            bias_threshold: default_bias_threshold(),
            search_top_k: default_search_top_k(),
            max_traversal_depth: default_max_depth(),
            min_relevance_score: default_min_relevance(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: None,
            embed_model: default_embed_model(),
            completion_model: default_completion_model(),
            dimensions: default_dimensions(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Loading & validation ─────────────────────────────────────────────

impl Config {
    /// Load configuration from a TOML file, filling omitted fields with
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!("Loaded config, repository root: {}", config.repository_root);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repository_root.is_empty() {
            bail!("repository_root must not be empty");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.source_extensions.is_empty() {
            bail!("source_extensions must not be empty");
        }
        if !(0.0..=1.0).contains(&self.bias_threshold) {
            bail!("bias_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            bail!("min_relevance_score must be within [0, 1]");
        }
        if self.oracle.dimensions == 0 {
            bail!("oracle.dimensions must be at least 1");
        }
        Ok(())
    }

    /// Effective namespace: explicit value, or the root's directory name.
    pub fn effective_namespace(&self) -> String {
        if let Some(ns) = &self.namespace {
            return ns.clone();
        }
        PathBuf::from(&self.repository_root)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "default".to_string())
    }
}
