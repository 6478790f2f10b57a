//! Answer synthesis: extractive QA over retrieved chunks, and map-reduce
//! summarization over every chunk of a document.
//!
//! # Modes
//!
//! | Mode | Input | Model calls | Citations |
//! |------|-------|-------------|-----------|
//! | [`AnswerMode::Extractive`] | top-k [`RetrievalResult`]s | 1 | retrieval order |
//! | [`AnswerMode::Summary`] | all [`Chunk`]s | one per chunk + 1 | none |
//!
//! The mode is picked by [`ModeClassifier`] from summarization-intent
//! keywords in the question.
//!
//! # Map-phase failures
//!
//! A failed per-chunk summary is logged and left out of the reduce input;
//! the remaining chunks still produce an answer. Only when every map call
//! fails is the request failed, since there is nothing left to reduce.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::models::{AnswerPackage, Chunk, Citation, RetrievalResult};

/// Fixed phrase the model is told to reply with when the excerpts do not
/// support an answer. Returning it is a valid outcome, not an error.
pub const NOT_FOUND_SENTINEL: &str = "Not found in the document.";

/// Default summarization-intent keywords (Korean and English).
pub const DEFAULT_SUMMARY_KEYWORDS: [&str; 6] =
    ["요약", "정리", "알려줘", "설명해", "summarize", "explain"];

/// How a document question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Extractive,
    Summary,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMode::Extractive => "extractive",
            AnswerMode::Summary => "summary",
        }
    }
}

/// Keyword heuristic that selects summary mode.
#[derive(Debug, Clone)]
pub struct ModeClassifier {
    keywords: Vec<String>,
}

impl ModeClassifier {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Summary mode if any keyword occurs in the question (case-insensitive).
    pub fn classify(&self, question: &str) -> AnswerMode {
        let q = question.to_lowercase();
        if self.keywords.iter().any(|k| q.contains(k.as_str())) {
            AnswerMode::Summary
        } else {
            AnswerMode::Extractive
        }
    }
}

impl Default for ModeClassifier {
    fn default() -> Self {
        Self::new(&DEFAULT_SUMMARY_KEYWORDS)
    }
}

/// Tuning for answer synthesis.
#[derive(Debug, Clone)]
pub struct SynthSettings {
    /// Sampling temperature for extractive answers.
    pub qa_temperature: f32,
    /// Sampling temperature for map and reduce calls.
    pub summary_temperature: f32,
    /// Maximum in-flight map calls.
    pub map_concurrency: usize,
    /// Language the answer is written in.
    pub language: String,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            qa_temperature: 0.1,
            summary_temperature: 0.1,
            map_concurrency: 4,
            language: "Korean".to_string(),
        }
    }
}

/// Produces grounded answers from document chunks.
pub struct Synthesizer<'a> {
    model: &'a dyn ChatModel,
    settings: SynthSettings,
}

impl<'a> Synthesizer<'a> {
    pub fn new(model: &'a dyn ChatModel, settings: SynthSettings) -> Self {
        Self { model, settings }
    }

    /// Extractive QA: stuffs every retrieved chunk, in retrieval order, into
    /// the prompt and asks one question.
    ///
    /// With no retrieved chunks the sentinel is returned without a model call.
    pub async fn answer(&self, results: &[RetrievalResult], question: &str) -> Result<AnswerPackage> {
        if results.is_empty() {
            return Ok(not_found());
        }

        let messages = vec![
            ChatMessage::system(qa_prompt(&self.settings.language, results)),
            ChatMessage::user(question),
        ];
        let completion = self
            .model
            .complete(&messages, self.settings.qa_temperature)
            .await
            .map_err(Error::completion)?;

        Ok(AnswerPackage {
            answer_text: completion.into_text(),
            citations: results.iter().map(|r| Citation::from_chunk(&r.chunk)).collect(),
        })
    }

    /// Map-reduce summary over all chunks of a document.
    ///
    /// `request` is the user's original question, passed to the reduce step
    /// so the summary can follow its focus.
    pub async fn summarize(&self, chunks: &[Chunk], request: Option<&str>) -> Result<AnswerPackage> {
        if chunks.is_empty() {
            return Ok(not_found());
        }

        let summaries = self.map_chunks(chunks).await?;
        if summaries.is_empty() {
            debug!("no usable chunk summaries; skipping reduce");
            return Ok(not_found());
        }

        let messages = vec![
            ChatMessage::system(reduce_prompt(&self.settings.language)),
            ChatMessage::user(reduce_input(&summaries, request)),
        ];
        let completion = self
            .model
            .complete(&messages, self.settings.summary_temperature)
            .await
            .map_err(Error::completion)?;

        Ok(AnswerPackage {
            answer_text: completion.into_text(),
            citations: Vec::new(),
        })
    }

    /// Summarizes each chunk independently with bounded concurrency.
    ///
    /// Returns the successful summaries in document order.
    async fn map_chunks(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        let language = self.settings.language.as_str();
        let temperature = self.settings.summary_temperature;
        let model = self.model;

        // Built up front: futures created inside a stream closure fail the
        // higher-ranked Send check once this runs inside an axum handler.
        let calls: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let seq = chunk.sequence_index;
                let messages = vec![
                    ChatMessage::system(map_prompt(language)),
                    ChatMessage::user(chunk.text.clone()),
                ];
                async move {
                    let result = model
                        .complete(&messages, temperature)
                        .await
                        .map(|c| c.into_text());
                    (seq, result)
                }
            })
            .collect();

        let mut outcomes: Vec<(usize, anyhow::Result<String>)> = stream::iter(calls)
            .buffer_unordered(self.settings.map_concurrency.max(1))
            .collect()
            .await;

        outcomes.sort_by_key(|(seq, _)| *seq);

        let total = outcomes.len();
        let mut summaries = Vec::with_capacity(total);
        let mut failed = 0usize;
        for (seq, outcome) in outcomes {
            match outcome {
                Ok(text) if !text.trim().is_empty() => summaries.push(text),
                Ok(_) => debug!(chunk = seq, "empty chunk summary omitted"),
                Err(e) => {
                    failed += 1;
                    warn!(chunk = seq, error = %format!("{:#}", e), "chunk summary failed; omitting");
                }
            }
        }

        if failed == total {
            return Err(Error::CompletionProvider(format!(
                "all {} chunk summaries failed",
                total
            )));
        }
        if failed > 0 {
            warn!(failed, total, "summary built from partial chunk summaries");
        }

        Ok(summaries)
    }
}

fn not_found() -> AnswerPackage {
    AnswerPackage {
        answer_text: NOT_FOUND_SENTINEL.to_string(),
        citations: Vec::new(),
    }
}

fn qa_prompt(language: &str, results: &[RetrievalResult]) -> String {
    let context = results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the user's question using only the document excerpts below.\n\
         - Answer in {language}, accurately and concisely.\n\
         - Copy numbers, units and symbols exactly as written (η, THD, pf, pu, kW, kWh, °C, Ω); never convert or round them.\n\
         - If the excerpts do not contain the answer, reply with exactly: {sentinel}\n\
         \n\
         [Document excerpts]\n\
         {context}",
        language = language,
        sentinel = NOT_FOUND_SENTINEL,
        context = context,
    )
}

fn map_prompt(language: &str) -> String {
    format!(
        "Summarize the document excerpt from the user in {}. \
         Keep every number, unit and symbol exactly as written. \
         Reply with the summary only.",
        language
    )
}

fn reduce_prompt(language: &str) -> String {
    format!(
        "You are an expert at summarizing documents. Combine the partial summaries \
         from the user into one detailed summary of the whole document, written in {}. \
         Organize it as an introduction, a body grouped by topic, and a conclusion. \
         Keep numbers, units and symbols exactly as written.",
        language
    )
}

fn reduce_input(summaries: &[String], request: Option<&str>) -> String {
    let mut input = String::from("[Partial summaries]\n");
    input.push_str(&summaries.join("\n\n---\n\n"));
    if let Some(request) = request.filter(|r| !r.trim().is_empty()) {
        input.push_str("\n\n[Request]\n");
        input.push_str(request);
    }
    input
}
