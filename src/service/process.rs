//! Ingestion pipeline: per-file processing, repository scans with a
//! bounded worker pool, and caller-driven update notifications.
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{BatchResult, ChangeType, CodeRetrievalService, ProcessingStats, ServiceError,
            UpdateOutcome, UpdateRequest};
use crate::discovery;
use crate::model::CodeRepresentation;
use crate::{bias, extractor};

impl CodeRetrievalService {
    /// Run the full pipeline over every source file under `root`.
    ///
    /// Files fan out across a bounded worker pool; a failure in one file
    /// never aborts the scan.
    pub async fn analyze_repository(&self, root: &str) -> Result<ProcessingStats, ServiceError> {
        let started = Instant::now();
        let root = self.validate_path(root)?;
        let files = discovery::list_source_files(
            Path::new(&root),
            &self.config.source_extensions,
            &self.config.excluded_dirs,
        )?;
        let total_files = files.len();
        info!("Analyzing repository {root}: {total_files} files");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join_set = JoinSet::new();
        for path in files {
            let service = self.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = service.process_file(&path).await;
                (path, result)
            });
        }

        let mut stats = ProcessingStats {
            total_files,
            ..ProcessingStats::default()
        };
        let mut bias_sum = 0.0;

        while let Some(joined) = join_set.join_next().await {
            let Ok((path, result)) = joined else {
                stats.failed += 1;
                continue;
            };
            match result {
                Ok(Some(repr)) => {
                    stats.files_processed += 1;
                    bias_sum += repr.bias_score;
                    if repr.bias_score > self.config.bias_threshold {
                        stats.bias_detected += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Processing failed for {path}: {e}");
                    stats.failed += 1;
                }
            }
        }

        if stats.files_processed > 0 {
            stats.average_bias_score = bias_sum / stats.files_processed as f64;
        }
        stats.processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Repository analyzed: {}/{} processed, {} failed, {} biased",
            stats.files_processed, stats.total_files, stats.failed, stats.bias_detected
        );
        Ok(stats)
    }

    /// Run the pipeline for one file and store the result.
    ///
    /// Returns `None` for files outside the configured extension set.
    pub async fn process_file(
        &self,
        path: &str,
    ) -> Result<Option<CodeRepresentation>, ServiceError> {
        let path = self.validate_path(path)?;

        let ext = Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !self.config.source_extensions.iter().any(|e| e == &ext) {
            return Ok(None);
        }

        // Extract
        let content = discovery::read_file(Path::new(&path))?;
        let mut repr = CodeRepresentation::new(path.clone(), content);
        let extraction = extractor::extract(&repr.content, &path, None);
        repr.textual = extraction.textual;
        repr.structural = extraction.structural;
        repr.relationships = extraction.relationships;
        repr.last_modified = file_modified(&path);

        // Bias score
        repr.bias_score = bias::detect_bias(&repr);

        // Augment. The oracle ports are synchronous; hop onto the
        // blocking pool so an HTTP-backed oracle cannot stall or panic
        // the async workers. A join failure degrades to the unaugmented
        // representation.
        let augmenter = self.augmenter.clone();
        let input = repr.clone();
        repr = match tokio::task::spawn_blocking(move || augmenter.augment(input)).await {
            Ok(augmented) => augmented,
            Err(e) => {
                warn!("Augmentation task failed for {path}: {e}");
                repr
            }
        };

        // Store
        {
            let mut db = self.db.lock().await;
            db.upsert_representation(&repr)?;
        }
        self.cache.lock().await.insert(path, repr.clone());

        Ok(Some(repr))
    }

    /// Apply one caller-reported file change.
    pub async fn update_file(
        &self,
        path: &str,
        change: ChangeType,
    ) -> Result<UpdateOutcome, ServiceError> {
        let normalized = match self.validate_path(path) {
            Ok(p) => p,
            Err(e) => {
                return Ok(UpdateOutcome {
                    path: path.to_string(),
                    success: false,
                    message: e.to_string(),
                    bias_score: None,
                });
            }
        };

        match change {
            ChangeType::Deleted => {
                self.cache.lock().await.remove(&normalized);
                let removed = {
                    let mut db = self.db.lock().await;
                    db.delete_representation(&normalized)?
                };
                Ok(UpdateOutcome {
                    path: normalized,
                    success: true,
                    message: if removed {
                        "representation and relationships removed".to_string()
                    } else {
                        "path was not indexed; nothing removed".to_string()
                    },
                    bias_score: None,
                })
            }
            ChangeType::Created | ChangeType::Modified => {
                match self.process_file(&normalized).await {
                    Ok(Some(repr)) => Ok(UpdateOutcome {
                        path: normalized,
                        success: true,
                        message: "file processed".to_string(),
                        bias_score: Some(repr.bias_score),
                    }),
                    Ok(None) => Ok(UpdateOutcome {
                        path: normalized,
                        success: false,
                        message: "unsupported file type".to_string(),
                        bias_score: None,
                    }),
                    Err(ServiceError::Discovery(e)) => Ok(UpdateOutcome {
                        path: normalized,
                        success: false,
                        message: e.to_string(),
                        bias_score: None,
                    }),
                    // Nothing useful proceeds without durable state.
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Apply a batch of changes with per-item isolation. Results preserve
    /// input order.
    pub async fn update_files(&self, items: &[UpdateRequest]) -> BatchResult {
        let mut batch = BatchResult::default();
        for item in items {
            let outcome = match self.update_file(&item.path, item.change_type).await {
                Ok(outcome) => outcome,
                Err(e) => UpdateOutcome {
                    path: item.path.clone(),
                    success: false,
                    message: e.to_string(),
                    bias_score: None,
                },
            };
            if outcome.success {
                batch.succeeded += 1;
            } else {
                batch.failed += 1;
            }
            batch.results.push(outcome);
        }
        batch
    }

    /// Reject any path that does not resolve under the repository root.
    /// Pure lexical normalization; no state is touched on rejection.
    pub(crate) fn validate_path(&self, path: &str) -> Result<String, ServiceError> {
        let root = normalize_lexical(&self.config.repository_root);
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{root}/{path}")
        };
        let normalized = normalize_lexical(&joined);

        if normalized == root || normalized.starts_with(&format!("{root}/")) {
            Ok(normalized)
        } else {
            Err(ServiceError::PathOutsideRoot {
                path: path.to_string(),
                root,
            })
        }
    }
}

fn file_modified(path: &str) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Collapse `.`/`..` segments and backslashes without touching the
/// filesystem, so validation also works for already-deleted paths.
fn normalize_lexical(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let absolute = forward.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in forward.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() && !absolute {
                    // Relative paths may not climb above their base.
                    parts.clear();
                }
            }
            other => parts.push(other),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::oracle::mock::{MockCompletionModel, MockEmbedder};

    fn service_with_root(root: &str) -> CodeRetrievalService {
        let config = Config {
            repository_root: root.to_string(),
            ..Config::default()
        };
        CodeRetrievalService::open_in_memory(
            config,
            Arc::new(MockEmbedder::default()),
            Arc::new(MockCompletionModel),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(normalize_lexical("/workspace/./a/../b.js"), "/workspace/b.js");
        assert_eq!(normalize_lexical("/workspace//x.js"), "/workspace/x.js");
        assert_eq!(normalize_lexical("a/b/../c"), "a/c");
        assert_eq!(normalize_lexical("/workspace/../etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn test_validate_path_accepts_inside_root() {
        let service = service_with_root("/workspace");
        assert_eq!(
            service.validate_path("/workspace/src/a.js").unwrap(),
            "/workspace/src/a.js"
        );
        assert_eq!(
            service.validate_path("src/b.js").unwrap(),
            "/workspace/src/b.js"
        );
    }

    #[test]
    fn test_validate_path_rejects_outside_root() {
        let service = service_with_root("/workspace");
        assert!(service.validate_path("/etc/passwd").is_err());
        assert!(service.validate_path("/workspace/../etc/passwd").is_err());
        assert!(service.validate_path("../outside.js").is_err());
        // Prefix collision is not containment.
        assert!(service.validate_path("/workspace2/a.js").is_err());
    }

    #[tokio::test]
    async fn test_update_file_outside_root_rejected_without_mutation() {
        let service = service_with_root("/workspace");
        let outcome = service
            .update_file("/etc/passwd", ChangeType::Modified)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("repository root"));

        let stats = service.system_stats().await.unwrap();
        assert_eq!(stats.representations, 0);
        assert_eq!(stats.cache_entries, 0);
    }

    #[tokio::test]
    async fn test_update_files_preserves_input_order() {
        let service = service_with_root("/workspace");
        let items = vec![
            UpdateRequest {
                path: "/etc/shadow".to_string(),
                change_type: ChangeType::Modified,
            },
            UpdateRequest {
                path: "/workspace/missing.js".to_string(),
                change_type: ChangeType::Deleted,
            },
            UpdateRequest {
                path: "/workspace/gone.js".to_string(),
                change_type: ChangeType::Modified,
            },
        ];
        let batch = service.update_files(&items).await;

        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.results[0].path, "/etc/shadow");
        assert!(!batch.results[0].success);
        assert_eq!(batch.results[1].path, "/workspace/missing.js");
        assert!(batch.results[1].success);
        assert_eq!(batch.results[2].path, "/workspace/gone.js");
        assert!(!batch.results[2].success, "missing file cannot be processed");
        assert_eq!(batch.succeeded, 1);
        assert_eq!(batch.failed, 2);
    }

    #[tokio::test]
    async fn test_process_file_unsupported_extension() {
        let service = service_with_root("/workspace");
        let result = service.process_file("/workspace/readme.md").await.unwrap();
        assert!(result.is_none());
    }
}
