use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use sentinel_core::config::VectorConfig;

use crate::cache::{CacheError, SemanticCache};
use crate::entry::{CacheMatch, CacheMetadata};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstash Vector REST backend.
pub struct UpstashCache {
    client: Client,
    url: String,
    token: String,
    threshold: f64,
}

impl UpstashCache {
    pub fn new(url: String, token: String, threshold: f64) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.trim_end_matches('/').to_string(),
            token,
            threshold,
        }
    }

    pub fn from_config(config: &VectorConfig) -> Result<Self, CacheError> {
        match (&config.url, &config.token) {
            (Some(url), Some(token)) => Ok(Self::new(url.clone(), token.clone(), config.similarity_threshold)),
            _ => Err(CacheError::NotConfigured(
                "UPSTASH_VECTOR_REST_URL and UPSTASH_VECTOR_REST_TOKEN must be set".into(),
            )),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Serialize)]
struct UpsertPoint<'a> {
    id: &'a str,
    vector: &'a [f32],
    metadata: &'a CacheMetadata,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Option<Vec<ScoredPoint>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Highest-scoring point if it reaches `threshold`. Input order is not trusted.
pub fn select_best(mut points: Vec<ScoredPoint>, threshold: f64) -> Option<ScoredPoint> {
    points.sort_by(|a, b| b.score.total_cmp(&a.score));
    points.into_iter().next().filter(|best| best.score >= threshold)
}

fn into_match(point: ScoredPoint) -> Result<CacheMatch, CacheError> {
    let raw = point
        .metadata
        .ok_or_else(|| CacheError::Parse(format!("match {} has no metadata", point.id)))?;
    let metadata: CacheMetadata = serde_json::from_value(raw)
        .map_err(|e| CacheError::Parse(format!("match {}: {}", point.id, e)))?;
    Ok(CacheMatch {
        id: point.id,
        score: point.score,
        metadata,
    })
}

#[async_trait]
impl SemanticCache for UpstashCache {
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Option<CacheMatch>, CacheError> {
        let response = self
            .client
            .post(format!("{}/query", self.url))
            .bearer_auth(&self.token)
            .json(&QueryRequest {
                vector,
                top_k,
                include_metadata: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "vector query rejected, treating as miss");
            return Ok(None);
        }

        let resp: QueryResponse = response
            .json()
            .await
            .map_err(|e| CacheError::Parse(e.to_string()))?;
        let points = resp.result.unwrap_or_default();
        debug!(candidates = points.len(), "vector query returned");

        select_best(points, self.threshold).map(into_match).transpose()
    }

    async fn upsert(&self, id: &str, vector: &[f32], metadata: &CacheMetadata) -> Result<bool, CacheError> {
        let response = self
            .client
            .post(format!("{}/upsert", self.url))
            .bearer_auth(&self.token)
            .json(&[UpsertPoint { id, vector, metadata }])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, id, body = %body, "vector upsert rejected");
            return Ok(false);
        }
        debug!(id, "vector upserted");
        Ok(true)
    }

    fn provider(&self) -> &str {
        "upstash"
    }
}
