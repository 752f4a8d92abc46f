use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use sentinel_core::config::EmbeddingConfig;

use super::traits::{Embedder, EmbeddingError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini `embedContent` backend.
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, model: String, base_url: Option<String>, dimensions: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            model,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            dimensions,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingError::NotConfigured("GEMINI_API_KEY is not set".into()))?;
        Ok(Self::new(
            api_key,
            config.model.clone(),
            Some(config.base_url.clone()),
            config.dimensions,
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model)
    }
}

/// Request body for a single-text `embedContent` call.
pub fn build_request_body(text: &str, dimensions: usize) -> Value {
    json!({
        "content": { "parts": [{ "text": text }] },
        "output_dimensionality": dimensions,
    })
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request_body(text, self.dimensions))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status, body });
        }

        let resp: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;
        let values = resp
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| EmbeddingError::Parse("response has no embedding".into()))?;

        if values.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: values.len(),
            });
        }

        debug!(model = %self.model, dims = values.len(), "embedded text");
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{StatusCode, Uri};
    use axum::{Json, Router};

    #[derive(Clone, Debug)]
    struct Captured {
        path: String,
        query: HashMap<String, String>,
        body: Value,
    }

    #[derive(Clone)]
    struct FakeGemini {
        status: StatusCode,
        response: Value,
        captured: Arc<Mutex<Vec<Captured>>>,
    }

    async fn handle(
        State(fake): State<FakeGemini>,
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        fake.captured.lock().unwrap().push(Captured {
            path: uri.path().to_string(),
            query,
            body,
        });
        (fake.status, Json(fake.response.clone()))
    }

    async fn spawn_fake(status: StatusCode, response: Value) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let fake = FakeGemini {
            status,
            response,
            captured: captured.clone(),
        };
        let app = Router::new().fallback(handle).with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn values(n: usize) -> Value {
        json!({ "embedding": { "values": vec![0.25f32; n] } })
    }

    fn embedder(base_url: String, dims: usize) -> GeminiEmbedder {
        GeminiEmbedder::new("test-key".into(), "gemini-embedding-001".into(), Some(base_url), dims)
    }

    #[test]
    fn request_body_shape() {
        let body = build_request_body("Amount: 1.00 CAD", 1536);
        assert_eq!(body["content"]["parts"][0]["text"], "Amount: 1.00 CAD");
        assert_eq!(body["output_dimensionality"], 1536);
    }

    #[tokio::test]
    async fn embed_returns_vector_and_sends_key() {
        let (url, captured) = spawn_fake(StatusCode::OK, values(1536)).await;
        let vector = embedder(url, 1536).embed("hello").await.unwrap();

        assert_eq!(vector.len(), 1536);
        assert_eq!(vector[0], 0.25);

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/v1beta/models/gemini-embedding-001:embedContent");
        assert_eq!(calls[0].query.get("key").map(String::as_str), Some("test-key"));
        assert_eq!(calls[0].body["content"]["parts"][0]["text"], "hello");
        assert_eq!(calls[0].body["output_dimensionality"], 1536);
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let (url, _) = spawn_fake(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": "Quota exceeded" }),
        )
        .await;
        let err = embedder(url, 1536).embed("hello").await.unwrap_err();

        match &err {
            EmbeddingError::Api { status, body } => {
                assert_eq!(*status, 429);
                assert!(body.contains("Quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("Gemini embedding failed"));
    }

    #[tokio::test]
    async fn wrong_length_is_rejected() {
        let (url, _) = spawn_fake(StatusCode::OK, values(8)).await;
        let err = embedder(url, 1536).embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 1536, actual: 8 }
        ));
    }

    #[tokio::test]
    async fn missing_embedding_is_parse_error() {
        let (url, _) = spawn_fake(StatusCode::OK, json!({})).await;
        let err = embedder(url, 4).embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Parse(_)));
    }

    #[test]
    fn from_config_requires_key() {
        let config = EmbeddingConfig {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            model: "gemini-embedding-001".into(),
            dimensions: 1536,
        };
        assert!(matches!(
            GeminiEmbedder::from_config(&config),
            Err(EmbeddingError::NotConfigured(_))
        ));
    }
}
