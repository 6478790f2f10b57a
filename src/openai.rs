//! Shared HTTP plumbing for OpenAI-compatible APIs.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff doubles from `backoff_base`: 1s, 2s, 4s, … (capped at 2^5)

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tracing::warn;

/// Retry settings for one provider.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base: Duration::from_secs(1),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base * (1u32 << (attempt - 1).min(5))
    }
}

/// Builds a client whose every request is bounded by `timeout_secs`.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Joins a base URL such as `https://api.openai.com/v1` with an endpoint path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// POSTs `body` as JSON and returns the parsed JSON response, retrying
/// transient failures per `policy`.
///
/// `label` names the provider in log lines and errors.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &serde_json::Value,
    policy: RetryPolicy,
    label: &str,
) -> Result<serde_json::Value> {
    let api_key = api_key.ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?;

    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay(attempt)).await;
        }

        let resp = client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("{} returned invalid JSON", label));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(provider = label, attempt, %status, "transient provider error");
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                warn!(provider = label, attempt, error = %e, "provider request failed");
                last_err = Some(anyhow::Error::new(e).context(format!("{} request failed", label)));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} call failed after retries", label)))
}
