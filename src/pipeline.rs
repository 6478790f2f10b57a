//! Document question answering: upload → pages → chunks → answer.
//!
//! ```text
//! bytes ─▶ extract_pages ─▶ chunk_pages ─▶ classify question
//!                                             │
//!                     ┌───────────────────────┴───────────────┐
//!                     ▼ extractive                            ▼ summary
//!          SimilarityIndex::build ─▶ Retriever::query    map-reduce over
//!                     ─▶ Synthesizer::answer             every chunk
//! ```
//!
//! Everything built here (pages, chunks, the index) belongs to one call
//! and is dropped when it returns.

use jeongirit_core::chunk::{chunk_pages, ChunkParams};
use jeongirit_core::embedding::Embedder;
use jeongirit_core::index::SimilarityIndex;
use jeongirit_core::llm::ChatModel;
use jeongirit_core::models::{AnswerPackage, Chunk};
use jeongirit_core::retriever::Retriever;
use jeongirit_core::synth::{AnswerMode, ModeClassifier, Synthesizer};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::extract::{extract_pages, ExtractError};

/// An uploaded document, read fully into memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// Used as the citation source.
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Core(#[from] jeongirit_core::Error),
    #[error("text extraction task failed: {0}")]
    Task(String),
}

/// Answer plus what it took to produce it.
#[derive(Debug, Clone)]
pub struct DocumentAnswer {
    pub mode: AnswerMode,
    pub package: AnswerPackage,
    pub page_count: usize,
    pub chunk_count: usize,
}

/// A chunked upload, before any provider call.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub page_count: usize,
    pub chunks: Vec<Chunk>,
}

/// Extracts and chunks an upload. Blocking.
pub fn prepare(upload: &Upload, params: &ChunkParams) -> Result<PreparedDocument, PipelineError> {
    let pages = extract_pages(
        &upload.bytes,
        upload.content_type.as_deref(),
        Some(upload.file_name.as_str()),
    )?;
    let chunks = chunk_pages(&pages, &upload.file_name, params)?;
    Ok(PreparedDocument {
        page_count: pages.len(),
        chunks,
    })
}

/// Runs the document-QA pipeline against shared providers.
pub struct DocumentQa {
    config: Arc<Config>,
    params: ChunkParams,
    classifier: ModeClassifier,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
}

impl DocumentQa {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> anyhow::Result<Self> {
        let params = config.chunking.params()?;
        let classifier = ModeClassifier::new(&config.summary.keywords);
        Ok(Self {
            config,
            params,
            classifier,
            embedder,
            model,
        })
    }

    /// Answers `question` about `upload`.
    ///
    /// # Errors
    ///
    /// - [`jeongirit_core::Error::InvalidArgument`] for a blank question
    /// - [`PipelineError::Extract`] for unreadable uploads
    /// - provider errors from embedding or completion calls
    ///
    /// A document without any text is answered with the not-found sentinel
    /// and costs no provider calls.
    pub async fn answer(&self, upload: Upload, question: &str) -> Result<DocumentAnswer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(jeongirit_core::Error::InvalidArgument(
                "question must not be empty".to_string(),
            )
            .into());
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("document_qa", %request_id);
        self.run(upload, question).instrument(span).await
    }

    async fn run(&self, upload: Upload, question: &str) -> Result<DocumentAnswer, PipelineError> {
        let file_name = upload.file_name.clone();
        let byte_count = upload.bytes.len();

        // pdf-extract is CPU-bound and may panic on hostile input
        let params = self.params.clone();
        let prepared = tokio::task::spawn_blocking(move || prepare(&upload, &params))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let mode = self.classifier.classify(question);
        info!(
            file = %file_name,
            bytes = byte_count,
            pages = prepared.page_count,
            chunks = prepared.chunks.len(),
            mode = mode.as_str(),
            "document QA request"
        );

        let synth = Synthesizer::new(self.model.as_ref(), self.config.synth_settings());
        let chunk_count = prepared.chunks.len();

        let package = match mode {
            AnswerMode::Extractive => {
                let index = SimilarityIndex::build(
                    self.embedder.as_ref(),
                    prepared.chunks,
                    self.config.embedding.batch_size,
                )
                .await?;
                let results = Retriever::new(self.embedder.as_ref())
                    .query(&index, question, self.config.retrieval.qa_top_k)
                    .await?;
                synth.answer(&results, question).await?
            }
            AnswerMode::Summary => synth.summarize(&prepared.chunks, Some(question)).await?,
        };

        info!(
            citations = package.citations.len(),
            answer_chars = package.answer_text.chars().count(),
            "document QA answered"
        );

        Ok(DocumentAnswer {
            mode,
            package,
            page_count: prepared.page_count,
            chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use jeongirit_core::llm::{ChatMessage, Completion};
    use jeongirit_core::synth::NOT_FOUND_SENTINEL;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct WordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for WordEmbedder {
        fn model_name(&self) -> &str {
            "words"
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["inverter", "battery", "motor"]
                        .iter()
                        .map(|w| t.matches(w).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct EchoModel {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, messages: &[ChatMessage], _t: f32) -> Result<Completion> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(Completion::text(format!("reply #{}", self.calls.lock().unwrap().len())))
        }
    }

    /// Fails every map call over the battery paragraph.
    struct FlakyModel;

    #[async_trait]
    impl ChatModel for FlakyModel {
        fn model_name(&self) -> &str {
            "flaky"
        }
        async fn complete(&self, messages: &[ChatMessage], _t: f32) -> Result<Completion> {
            if messages.iter().any(|m| m.content.contains("battery")) {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(Completion::text("summary"))
        }
    }

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn fixture() -> (DocumentQa, Arc<WordEmbedder>, Arc<EchoModel>) {
        let mut config = Config::minimal();
        config.chunking.chunk_size = 60;
        config.chunking.overlap = 10;
        config.retrieval.qa_top_k = 2;
        let embedder = Arc::new(WordEmbedder { calls: AtomicUsize::new(0) });
        let model = Arc::new(EchoModel { calls: Mutex::new(Vec::new()) });
        let qa = DocumentQa::new(Arc::new(config), embedder.clone(), model.clone()).unwrap();
        (qa, embedder, model)
    }

    fn text_upload(text: &str) -> Upload {
        Upload {
            bytes: text.as_bytes().to_vec(),
            file_name: "manual.txt".to_string(),
            content_type: Some("text/plain".to_string()),
        }
    }

    const MANUAL: &str = "The inverter converts DC to AC at 95% efficiency.\n\n\
        The battery stores 10 kWh and charges at 5 kW.\n\n\
        The motor is rated 7.5 kW at 1800 rpm.\n\n\
        The inverter THD is below 3% at full load.";

    #[tokio::test]
    async fn test_extractive_mode_cites_retrieved_pages() {
        let (qa, embedder, model) = fixture();
        let out = qa.answer(text_upload(MANUAL), "What is the inverter efficiency?").await.unwrap();

        assert_eq!(out.mode, AnswerMode::Extractive);
        assert_eq!(out.page_count, 1);
        assert!(out.chunk_count >= 4);
        assert_eq!(out.package.citations.len(), 2);
        for c in &out.package.citations {
            assert_eq!(c.page, Some(1));
            assert_eq!(c.source, "manual.txt");
        }
        assert_eq!(model.calls.lock().unwrap().len(), 1);
        // one batch for the chunks, one for the question
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let prompt = &model.calls.lock().unwrap()[0][0].content;
        assert!(prompt.contains("inverter"));
    }

    #[tokio::test]
    async fn test_summary_mode_maps_every_chunk() {
        let (qa, embedder, model) = fixture();
        let out = qa.answer(text_upload(MANUAL), "이 문서를 요약해줘").await.unwrap();

        assert_eq!(out.mode, AnswerMode::Summary);
        assert!(out.package.citations.is_empty());
        assert_eq!(model.calls.lock().unwrap().len(), out.chunk_count + 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_future_runs_on_spawned_task() {
        let (qa, _, model) = fixture();
        let qa = Arc::new(qa);

        let summary = {
            let qa = qa.clone();
            tokio::spawn(async move { qa.answer(text_upload(MANUAL), "summarize this").await })
        };
        let extractive = {
            let qa = qa.clone();
            tokio::spawn(async move { qa.answer(text_upload(MANUAL), "inverter THD?").await })
        };

        assert_eq!(summary.await.unwrap().unwrap().mode, AnswerMode::Summary);
        assert_eq!(extractive.await.unwrap().unwrap().mode, AnswerMode::Extractive);
        assert!(model.calls.lock().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn test_chunk_warnings_carry_request_span() {
        let writer = CaptureWriter::default();
        let sink = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut config = Config::minimal();
        config.chunking.chunk_size = 60;
        config.chunking.overlap = 10;
        let embedder = Arc::new(WordEmbedder { calls: AtomicUsize::new(0) });
        let qa = DocumentQa::new(Arc::new(config), embedder, Arc::new(FlakyModel)).unwrap();

        let out = qa.answer(text_upload(MANUAL), "summarize this").await.unwrap();
        assert_eq!(out.mode, AnswerMode::Summary);
        assert_eq!(out.package.answer_text, "summary");

        let logs = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        let warning = logs
            .lines()
            .find(|l| l.contains("chunk summary failed"))
            .unwrap_or_else(|| panic!("no chunk warning in:\n{}", logs));
        assert!(warning.contains("document_qa{request_id="), "{}", warning);
    }

    #[tokio::test]
    async fn test_blank_document_needs_no_providers() {
        let (qa, embedder, model) = fixture();
        let out = qa.answer(text_upload("   \n\n  "), "What is the rating?").await.unwrap();
        assert_eq!(out.package.answer_text, NOT_FOUND_SENTINEL);
        assert_eq!(out.chunk_count, 0);
        assert_eq!(model.calls.lock().unwrap().len(), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_question_is_invalid() {
        let (qa, _, _) = fixture();
        let err = qa.answer(text_upload(MANUAL), "  ").await.unwrap_err();
        assert!(matches!(err, PipelineError::Core(jeongirit_core::Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_unsupported_upload() {
        let (qa, _, _) = fixture();
        let upload = Upload {
            bytes: vec![0x50, 0x4b, 0x03, 0x04],
            file_name: "slides.zip".to_string(),
            content_type: Some("application/zip".to_string()),
        };
        let err = qa.answer(upload, "question").await.unwrap_err();
        assert!(matches!(err, PipelineError::Extract(ExtractError::UnsupportedContentType(_))));
    }

    #[test]
    fn test_prepare_chunks_text() {
        let params = ChunkParams::new(60, 10).unwrap();
        let prepared = prepare(&text_upload(MANUAL), &params).unwrap();
        assert_eq!(prepared.page_count, 1);
        let seq: Vec<usize> = prepared.chunks.iter().map(|c| c.sequence_index).collect();
        assert_eq!(seq, (0..prepared.chunks.len()).collect::<Vec<_>>());
        assert!(prepared.chunks.iter().all(|c| c.page_number == Some(0)));
    }
}
