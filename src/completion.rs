//! OpenAI-compatible chat-completion provider.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use jeongirit_core::llm::{ChatMessage, ChatModel, Completion};

use crate::config::Config;
use crate::openai::{build_client, endpoint, post_json, RetryPolicy};

/// [`ChatModel`] over `POST {base_url}/chat/completions`.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAIChatModel {
    pub fn new(config: &Config) -> Result<Self> {
        let cfg = &config.llm;
        Ok(Self {
            client: build_client(cfg.timeout_secs)?,
            url: endpoint(&cfg.base_url, "chat/completions"),
            model: cfg.model.clone(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::new(cfg.max_retries),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<Completion> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        let json = post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &body,
            self.retry,
            "OpenAI chat",
        )
        .await?;
        parse_completion(json)
    }
}

/// Takes `choices[0].message`; its `content` when that is a string.
fn parse_completion(mut json: serde_json::Value) -> Result<Completion> {
    let message = json
        .get_mut("choices")
        .and_then(|c| c.get_mut(0))
        .and_then(|c| c.get_mut("message"))
        .map(serde_json::Value::take)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message"))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    Ok(Completion {
        content,
        raw: message,
    })
}
