//! TOML configuration with environment overrides.
//!
//! Every section is optional; a missing config file falls back to
//! [`Config::minimal`]. After the file is read, a fixed set of
//! environment variables override it:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `OPENAI_API_KEY` | provider credential (never read from the file) |
//! | `OPENAI_MODEL` | `llm.model` |
//! | `OPENAI_BASE_URL` | `llm.base_url` and `embedding.base_url` |
//! | `FRONTEND_ORIGIN` | `server.allowed_origins` (single origin) |
//! | `JEONGIRIT_BIND` | `server.bind` |
//!
//! The loaded config is read-only for the life of the process.

use anyhow::{bail, Context, Result};
use jeongirit_core::chat::{ChatSettings, DEFAULT_STYLE};
use jeongirit_core::chunk::{ChunkParams, DEFAULT_SEPARATORS};
use jeongirit_core::synth::{SynthSettings, DEFAULT_SUMMARY_KEYWORDS};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "./config/jeongirit.toml";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    /// Provider credential, only ever taken from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat temperature when the request does not set one.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_qa_temperature")]
    pub qa_temperature: f32,
    #[serde(default = "default_suggestion_temperature")]
    pub suggestion_temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            qa_temperature: default_qa_temperature(),
            suggestion_temperature: default_suggestion_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_qa_temperature() -> f32 {
    0.1
}
fn default_suggestion_temperature() -> f32 {
    0.5
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(self.chunk_size, self.overlap)?.with_separators(&self.separators))
    }
}

fn default_chunk_size() -> usize {
    1200
}
fn default_overlap() -> usize {
    200
}
fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_qa_top_k")]
    pub qa_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qa_top_k: default_qa_top_k(),
        }
    }
}

fn default_qa_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummaryConfig {
    /// Case-insensitive terms that switch a question to summary mode.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_map_concurrency")]
    pub map_concurrency: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            map_concurrency: default_map_concurrency(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    DEFAULT_SUMMARY_KEYWORDS.iter().map(|s| s.to_string()).collect()
}
fn default_map_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_answer_window")]
    pub answer_window: usize,
    #[serde(default = "default_suggestion_window")]
    pub suggestion_window: usize,
    #[serde(default = "default_suggestion_count")]
    pub suggestion_count: usize,
    /// System message injected when the caller sends none.
    #[serde(default = "default_style")]
    pub style: String,
    /// Language document answers are written in.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            answer_window: default_answer_window(),
            suggestion_window: default_suggestion_window(),
            suggestion_count: default_suggestion_count(),
            style: default_style(),
            language: default_language(),
        }
    }
}

fn default_answer_window() -> usize {
    20
}
fn default_suggestion_window() -> usize {
    4
}
fn default_suggestion_count() -> usize {
    3
}
fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}
fn default_language() -> String {
    "Korean".to_string()
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Chat orchestrator settings.
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            answer_window: self.chat.answer_window,
            suggestion_window: self.chat.suggestion_window,
            suggestion_count: self.chat.suggestion_count,
            suggestion_temperature: self.llm.suggestion_temperature,
            style: self.chat.style.clone(),
        }
    }

    /// Answer synthesizer settings.
    pub fn synth_settings(&self) -> SynthSettings {
        SynthSettings {
            qa_temperature: self.llm.qa_temperature,
            summary_temperature: self.llm.qa_temperature,
            map_concurrency: self.summary.map_concurrency,
            language: self.chat.language.clone(),
        }
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }
        if self.chunking.separators.is_empty() {
            bail!("chunking.separators must not be empty");
        }
        if self.retrieval.qa_top_k < 1 {
            bail!("retrieval.qa_top_k must be >= 1");
        }
        if self.summary.map_concurrency < 1 {
            bail!("summary.map_concurrency must be >= 1");
        }
        if self.chat.answer_window < 1 {
            bail!("chat.answer_window must be >= 1");
        }
        if self.chat.suggestion_window < 1 {
            bail!("chat.suggestion_window must be >= 1");
        }
        if self.embedding.batch_size < 1 {
            bail!("embedding.batch_size must be >= 1");
        }
        for (key, value) in [
            ("llm.temperature", self.llm.temperature),
            ("llm.qa_temperature", self.llm.qa_temperature),
            ("llm.suggestion_temperature", self.llm.suggestion_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                bail!("{} must be in [0.0, 2.0], got {}", key, value);
            }
        }
        Ok(())
    }

    /// Applies overrides from a variable lookup.
    ///
    /// Takes a lookup function rather than reading the process environment
    /// so tests can supply their own values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.api_key = non_empty("OPENAI_API_KEY");
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(base) = non_empty("OPENAI_BASE_URL") {
            self.llm.base_url = base.clone();
            self.embedding.base_url = base;
        }
        if let Some(origin) = lookup("FRONTEND_ORIGIN") {
            self.server.allowed_origins = match origin.trim() {
                "" | "*" => Vec::new(),
                o => vec![o.to_string()],
            };
        }
        if let Some(bind) = non_empty("JEONGIRIT_BIND") {
            self.server.bind = bind;
        }
    }

    /// Logs a one-line summary and warns about a missing credential.
    pub fn log_summary(&self) {
        info!(
            bind = %self.server.bind,
            chat_model = %self.llm.model,
            embedding_model = %self.embedding.model,
            base_url = %self.llm.base_url,
            chunk_size = self.chunking.chunk_size,
            overlap = self.chunking.overlap,
            qa_top_k = self.retrieval.qa_top_k,
            "configuration loaded"
        );
        if self.api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; chat and document QA requests will fail");
        }
    }
}

/// Parses a config file's contents and validates it. No env overrides.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Loads `path` (or the defaults if it does not exist), applies the
/// process environment, and validates the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        info!(path = %path.display(), "config file not found; using defaults");
        Config::minimal()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_minimal_defaults() {
        let cfg = Config::minimal();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.chunking.chunk_size, 1200);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.chunking.separators, vec!["\n\n", "\n", ". ", " ", ""]);
        assert_eq!(cfg.retrieval.qa_top_k, 4);
        assert_eq!(cfg.chat.answer_window, 20);
        assert_eq!(cfg.chat.suggestion_window, 4);
        assert!(cfg.server.allowed_origins.is_empty());
        assert!(cfg.api_key.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = parse_config(
            r#"
[server]
bind = "0.0.0.0:9000"

[chunking]
chunk_size = 500
overlap = 50

[summary]
keywords = ["overview"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.summary.keywords, vec!["overview"]);
        assert_eq!(cfg.summary.map_concurrency, 4);
        assert_eq!(cfg.llm.qa_temperature, 0.1);
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse_config(include_str!("../config/jeongirit.example.toml")).unwrap();
        assert_eq!(cfg.server.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(cfg.chunking.separators, vec!["\n\n", "\n", ". ", " ", ""]);
        assert_eq!(cfg.chat.style, DEFAULT_STYLE);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_rejects_zero_top_k_and_bad_temperature() {
        assert!(parse_config("[retrieval]\nqa_top_k = 0\n").is_err());
        assert!(parse_config("[llm]\ntemperature = 3.5\n").is_err());
        assert!(parse_config("[summary]\nmap_concurrency = 0\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1"),
            ("FRONTEND_ORIGIN", "http://localhost:5173"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::minimal();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.embedding.base_url, "http://localhost:9999/v1");
        assert_eq!(cfg.server.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_empty_api_key_counts_as_missing() {
        let mut cfg = Config::minimal();
        cfg.apply_env(|k| (k == "OPENAI_API_KEY").then(|| "  ".to_string()));
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1200);
    }

    #[test]
    fn test_load_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jeongirit.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[retrieval]\nqa_top_k = 6").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.retrieval.qa_top_k, 6);
    }

    #[test]
    fn test_settings_projection() {
        let cfg = Config::minimal();
        let chat = cfg.chat_settings();
        assert_eq!(chat.answer_window, 20);
        assert_eq!(chat.suggestion_temperature, 0.5);
        let synth = cfg.synth_settings();
        assert_eq!(synth.qa_temperature, 0.1);
        assert_eq!(synth.language, "Korean");
    }
}
