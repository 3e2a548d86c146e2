/// HTTP oracle client for an OpenAI-compatible embeddings/completions
/// endpoint. Transient failures surface as [`OracleError`] and are treated
/// as file-scoped by the callers.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionModel, Embedder, OracleError};
use crate::config::OracleConfig;

pub struct HttpOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    embed_model: String,
    completion_model: String,
    dimensions: usize,
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

// ── Client ───────────────────────────────────────────────────────────

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("structrag")
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            embed_model: config.embed_model.clone(),
            completion_model: config.completion_model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, OracleError> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "{url} returned status {status}"
            )));
        }

        response
            .json()
            .map_err(|e| OracleError::Transport(format!("invalid response from {url}: {e}")))
    }
}

impl Embedder for HttpOracle {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        debug!("Embedding {} chars via {}", text.len(), self.endpoint);
        let response: EmbeddingResponse = self.post(
            "/embeddings",
            &EmbeddingRequest {
                model: &self.embed_model,
                input: text,
            },
        )?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| OracleError::EmbeddingFailed("empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl CompletionModel for HttpOracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let response: CompletionResponse = self.post(
            "/chat/completions",
            &CompletionRequest {
                model: &self.completion_model,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            },
        )?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::CompletionFailed("empty completion response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;

    #[test]
    fn test_client_builds_without_key() {
        let config = OracleConfig::default();
        let oracle = HttpOracle::new(&config).unwrap();
        assert_eq!(oracle.dimensions(), 384);
        assert!(oracle.api_key.is_none());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let config = OracleConfig {
            endpoint: "http://localhost:9999/v1/".to_string(),
            ..OracleConfig::default()
        };
        let oracle = HttpOracle::new(&config).unwrap();
        assert_eq!(oracle.endpoint, "http://localhost:9999/v1");
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let config = OracleConfig {
            endpoint: "http://127.0.0.1:1/v1".to_string(),
            timeout_secs: 1,
            ..OracleConfig::default()
        };
        let oracle = HttpOracle::new(&config).unwrap();
        match oracle.embed("text") {
            Err(OracleError::Transport(_)) => {}
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
