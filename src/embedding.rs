//! OpenAI-compatible embedding provider.
//!
//! [`OpenAIEmbedder`] implements the core [`Embedder`] trait over
//! `POST {base_url}/embeddings`, with the retry policy described in
//! [`crate::openai`]. One instance (and one HTTP client) is built at
//! startup and shared across requests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use jeongirit_core::embedding::Embedder;

use crate::config::Config;
use crate::openai::{build_client, endpoint, post_json, RetryPolicy};

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    /// Builds the embedder from `[embedding]` and the API key.
    ///
    /// A missing key is not an error here; calls fail when made.
    pub fn new(config: &Config) -> Result<Self> {
        let cfg = &config.embedding;
        Ok(Self {
            client: build_client(cfg.timeout_secs)?,
            url: endpoint(&cfg.base_url, "embeddings"),
            model: cfg.model.clone(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::new(cfg.max_retries),
        })
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &body,
            self.retry,
            "OpenAI embeddings",
        )
        .await?;

        let vectors = parse_embeddings(&json)?;
        if vectors.len() != texts.len() {
            bail!(
                "OpenAI embeddings returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index` field.
fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);

        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid embeddings response: missing embedding"))?;

        let vector = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value"))
            })
            .collect::<Result<Vec<f32>>>()?;

        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
