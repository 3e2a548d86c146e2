//! Orchestrator and public operation surface.
//!
//! Sequences extraction → bias scoring → augmentation → storage for
//! ingestion and search → rerank for querying. This is the API the outer
//! protocol layer consumes.
pub mod process;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

use crate::augmenter::Augmenter;
use crate::bias::{self, BiasIndicator};
use crate::config::Config;
use crate::db::Db;
use crate::db::traversal::TraversalOptions;
use crate::discovery::DiscoveryError;
use crate::model::{CodeRepresentation, GraphTraversalResult, RelatedComponent};
use crate::oracle::{CompletionModel, Embedder};
use crate::reranker::{self, EnhancedRetrievalResult, RetrievalResult};

/// Graph context for query enrichment is kept shallow.
const CONTEXT_DEPTH: usize = 2;

/// Candidate pool multiplier: the store returns more candidates than
/// `top_k` so the reranker has room to reorder.
const CANDIDATE_FACTOR: usize = 3;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("path {path} does not resolve under the repository root {root}")]
    PathOutsideRoot { path: String, root: String },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

// ── Result types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub total_files: usize,
    pub failed: usize,
    /// Files whose bias score exceeds the configured threshold.
    pub bias_detected: usize,
    pub average_bias_score: f64,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub path: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub path: String,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<UpdateOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBias {
    pub path: String,
    pub bias_score: f64,
    pub indicators: Vec<BiasIndicator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    pub files: Vec<FileBias>,
    pub files_analyzed: usize,
    pub average_bias: f64,
    pub high_bias_count: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub namespace: String,
    pub representations: usize,
    pub relationships: usize,
    pub average_bias: f64,
    pub cache_entries: usize,
}

// ── Service ──────────────────────────────────────────────────────────

/// The retrieval service: owns the store handle, the representation cache
/// and the oracle ports. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct CodeRetrievalService {
    pub(crate) config: Arc<Config>,
    pub(crate) db: Arc<TokioMutex<Db>>,
    pub(crate) cache: Arc<TokioMutex<HashMap<String, CodeRepresentation>>>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) augmenter: Arc<Augmenter>,
}

impl CodeRetrievalService {
    /// Open the service against the configured database path.
    pub fn open(
        config: Config,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionModel>,
    ) -> Result<Self, ServiceError> {
        let db = Db::open(
            &config.db_path,
            &config.effective_namespace(),
            config.oracle.dimensions,
        )?;
        Ok(Self::assemble(config, embedder, completer, db))
    }

    /// Open with an in-memory store (tests, ephemeral sessions).
    pub fn open_in_memory(
        config: Config,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionModel>,
    ) -> Result<Self, ServiceError> {
        let db = Db::open_in_memory(&config.effective_namespace(), config.oracle.dimensions)?;
        Ok(Self::assemble(config, embedder, completer, db))
    }

    fn assemble(
        config: Config,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionModel>,
        db: Db,
    ) -> Self {
        info!(
            "Service ready, namespace {} under {}",
            config.effective_namespace(),
            config.repository_root
        );
        let augmenter = Arc::new(Augmenter::new(embedder.clone(), completer));
        Self {
            config: Arc::new(config),
            db: Arc::new(TokioMutex::new(db)),
            cache: Arc::new(TokioMutex::new(HashMap::new())),
            embedder,
            augmenter,
        }
    }

    // ── Query operations ────────────────────────────────────────────

    /// Search then rerank: the standard query path.
    pub async fn query_code(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalResult>, ServiceError> {
        let candidates = self.candidates(query, limit).await?;
        Ok(reranker::rerank(&candidates, query, limit))
    }

    /// Query path with graph enrichment: related components, a context
    /// summary, and a dependency chain per result.
    pub async fn query_code_with_context(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EnhancedRetrievalResult>, ServiceError> {
        let candidates = self.candidates(query, limit).await?;
        let results = reranker::rerank(&candidates, query, limit);

        let options = TraversalOptions {
            weights: None,
            max_depth: CONTEXT_DEPTH,
            types: None,
            min_relevance_score: self.config.min_relevance_score,
        };

        let mut enhanced = Vec::with_capacity(results.len());
        let db = self.db.lock().await;
        for result in results {
            let related = db.related_components(&result.file_path, &options)?;
            let context_summary = reranker::context_summary(&related);
            let dependency_chain = reranker::dependency_chain(&result.file_path, &related);
            enhanced.push(EnhancedRetrievalResult {
                result,
                related_components: related,
                context_summary,
                dependency_chain,
            });
        }
        Ok(enhanced)
    }

    async fn candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CodeRepresentation>, ServiceError> {
        // The embedder port is synchronous; keep it off the async workers.
        let embedder = self.embedder.clone();
        let query_text = query.to_string();
        let query_embedding =
            tokio::task::spawn_blocking(move || embedder.embed(&query_text).ok())
                .await
                .ok()
                .flatten();

        let pool = limit.max(1) * CANDIDATE_FACTOR;
        let db = self.db.lock().await;
        Ok(db.search(query, query_embedding.as_deref(), pool)?)
    }

    // ── Graph operations ────────────────────────────────────────────

    pub async fn related_components(
        &self,
        path: &str,
        depth: Option<usize>,
    ) -> Result<Vec<RelatedComponent>, ServiceError> {
        let options = TraversalOptions {
            weights: None,
            max_depth: depth.unwrap_or(self.config.max_traversal_depth),
            types: None,
            min_relevance_score: self.config.min_relevance_score,
        };
        let db = self.db.lock().await;
        Ok(db.related_components(&self.resolve_known_path(path), &options)?)
    }

    pub async fn relationship_graph(
        &self,
        path: &str,
        types: Option<Vec<String>>,
    ) -> Result<GraphTraversalResult, ServiceError> {
        let options = TraversalOptions {
            weights: None,
            max_depth: self.config.max_traversal_depth,
            types,
            min_relevance_score: self.config.min_relevance_score,
        };
        let db = self.db.lock().await;
        Ok(db.traverse(&self.resolve_known_path(path), &options)?)
    }

    // ── Reports ─────────────────────────────────────────────────────

    /// Per-file bias detail, or a repository-wide aggregate when no path
    /// is given. Unknown paths yield an empty report, not an error.
    pub async fn bias_analysis(&self, path: Option<&str>) -> Result<BiasReport, ServiceError> {
        let threshold = self.config.bias_threshold;

        if let Some(path) = path {
            let path = self.resolve_known_path(path);
            let repr = {
                let cache = self.cache.lock().await;
                cache.get(&path).cloned()
            };
            let repr = match repr {
                Some(r) => Some(r),
                None => {
                    let db = self.db.lock().await;
                    db.get_representation(&path)?
                }
            };
            let Some(repr) = repr else {
                return Ok(BiasReport {
                    threshold,
                    ..BiasReport::default()
                });
            };
            let high = repr.bias_score > threshold;
            return Ok(BiasReport {
                average_bias: repr.bias_score,
                files_analyzed: 1,
                high_bias_count: usize::from(high),
                files: vec![FileBias {
                    path: repr.path.clone(),
                    bias_score: repr.bias_score,
                    indicators: bias::indicators(&repr),
                }],
                threshold,
            });
        }

        let db = self.db.lock().await;
        let files_analyzed = db.count_representations()?;
        let average_bias = db.average_bias()?;
        let flagged = db.high_bias_paths(threshold)?;

        let mut files = Vec::with_capacity(flagged.len());
        for (path, _) in &flagged {
            if let Some(repr) = db.get_representation(path)? {
                files.push(FileBias {
                    path: repr.path.clone(),
                    bias_score: repr.bias_score,
                    indicators: bias::indicators(&repr),
                });
            }
        }

        Ok(BiasReport {
            high_bias_count: flagged.len(),
            files,
            files_analyzed,
            average_bias,
            threshold,
        })
    }

    pub async fn system_stats(&self) -> Result<SystemStats, ServiceError> {
        let cache_entries = self.cache.lock().await.len();
        let db = self.db.lock().await;
        Ok(SystemStats {
            namespace: db.namespace().to_string(),
            representations: db.count_representations()?,
            relationships: db.count_relationships()?,
            average_bias: db.average_bias()?,
            cache_entries,
        })
    }

    /// Best-effort normalization for read-only graph lookups: a path that
    /// validates under the root is normalized, anything else is passed
    /// through so stored external identifiers stay addressable.
    fn resolve_known_path(&self, path: &str) -> String {
        self.validate_path(path).unwrap_or_else(|_| path.to_string())
    }
}
