//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/chat` | Chat answer plus follow-up suggestions |
//! | `POST` | `/api/document-qa` | Multipart upload (`file`, `question`) → answer + sources |
//! | `POST` | `/api/ohms-law` | Solve `V = IR`, `P = VI` from any two values |
//! | `POST` | `/api/resistance/series` | Series total |
//! | `POST` | `/api/resistance/parallel` | Parallel total |
//! | `POST` | `/api/rlc` | Series RLC reactances and impedance |
//! | `POST` | `/api/resistor-color` | Four-band color code |
//! | `GET`  | `/api/circuit-problem` | Random series-circuit exercise (`?format=png` default, or `svg`) |
//!
//! # Error Contract
//!
//! Chat and document-QA failures use one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413),
//! `provider_error` (502), `parse_error` (502), `internal` (500).
//!
//! Calculator endpoints answer bad input with `200` and a flat
//! `{"error": "..."}` body instead. A body that is not valid JSON for the
//! endpoint is a `bad_request` on every route.
//!
//! Non-finite results (e.g. `Xc` with `C = 0`) serialize as `null`.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jeongirit_core::calc::{self, OhmsLawInput, OhmsLawSolution, RlcInput, RlcOutput};
use jeongirit_core::chat::ChatOrchestrator;
use jeongirit_core::circuit::{self, CircuitProblem};
use jeongirit_core::embedding::Embedder;
use jeongirit_core::llm::{ChatMessage, ChatModel, Role};
use jeongirit_core::models::Citation;
use jeongirit_core::schematic::SchematicFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::completion::OpenAIChatModel;
use crate::config::Config;
use crate::embedding::OpenAIEmbedder;
use crate::pipeline::{DocumentQa, PipelineError, Upload};

/// The model providers the server talks to.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn ChatModel>,
}

impl Providers {
    /// OpenAI-compatible providers built from the config.
    pub fn openai(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            embedder: Arc::new(OpenAIEmbedder::new(config)?),
            model: Arc::new(OpenAIChatModel::new(config)?),
        })
    }
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    model: Arc<dyn ChatModel>,
    qa: Arc<DocumentQa>,
}

/// Starts the server with OpenAI-compatible providers.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let providers = Providers::openai(config)?;
    run_server_with_providers(config, providers).await
}

/// Starts the server with caller-supplied providers.
///
/// Used by tests to run the full HTTP stack against in-process fakes.
pub async fn run_server_with_providers(config: &Config, providers: Providers) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()), providers)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the application router.
pub fn router(config: Arc<Config>, providers: Providers) -> anyhow::Result<Router> {
    let qa = DocumentQa::new(config.clone(), providers.embedder, providers.model.clone())?;
    let cors = cors_layer(&config.server.allowed_origins)?;
    let upload_limit = config.server.max_upload_bytes;

    let state = AppState {
        config,
        model: providers.model,
        qa: Arc::new(qa),
    };

    Ok(Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/document-qa",
            post(handle_document_qa).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/ohms-law", post(handle_ohms_law))
        .route("/api/resistance/series", post(handle_series))
        .route("/api/resistance/parallel", post(handle_parallel))
        .route("/api/rlc", post(handle_rlc))
        .route("/api/resistor-color", post(handle_resistor_color))
        .route("/api/circuit-problem", get(handle_circuit_problem))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Any origin when `origins` is empty, otherwise exactly those origins.
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("Invalid allowed origin: {}", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<jeongirit_core::Error> for AppError {
    fn from(err: jeongirit_core::Error) -> Self {
        use jeongirit_core::Error;
        let message = err.to_string();
        match err {
            Error::InvalidArgument(_) | Error::Configuration(_) => bad_request(message),
            Error::EmbeddingProvider(_) | Error::CompletionProvider(_) => {
                app_error(StatusCode::BAD_GATEWAY, "provider_error", message)
            }
            Error::Parse(_) => app_error(StatusCode::BAD_GATEWAY, "parse_error", message),
            Error::Render(_) => app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(e) => e.into(),
            PipelineError::Extract(e) => bad_request(e.to_string()),
            PipelineError::Task(msg) => {
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        }
    }
}

/// `Json` extractor whose rejections use the JSON error body.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<WireMessage>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    system_style: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    output: String,
    suggestions: Vec<String>,
}

async fn handle_chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let messages = req
        .messages
        .into_iter()
        .map(|m| -> Result<ChatMessage, jeongirit_core::Error> {
            Ok(ChatMessage::new(m.role.parse::<Role>()?, m.content))
        })
        .collect::<Result<Vec<_>, jeongirit_core::Error>>()?;

    let temperature = req.temperature.unwrap_or(state.config.llm.temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(bad_request(format!(
            "temperature must be in [0.0, 2.0], got {}",
            temperature
        )));
    }

    let chat = ChatOrchestrator::new(state.model.as_ref(), state.config.chat_settings());
    let reply = chat
        .respond(messages, temperature, req.system_style.as_deref())
        .await?;

    Ok(Json(ChatResponse {
        output: reply.output,
        suggestions: reply.suggestions,
    }))
}

// ============ POST /api/document-qa ============

#[derive(Serialize)]
struct DocumentQaResponse {
    answer: String,
    sources: Vec<Citation>,
}

async fn handle_document_qa(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentQaResponse>, AppError> {
    let mut upload: Option<Upload> = None;
    let mut question: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            "question" => {
                question = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| bad_request("missing multipart field: file"))?;
    let question = question.ok_or_else(|| bad_request("missing multipart field: question"))?;

    let answer = state.qa.answer(upload, &question).await?;

    Ok(Json(DocumentQaResponse {
        answer: answer.package.answer_text,
        sources: answer.package.citations,
    }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        app_error(status, "payload_too_large", err.body_text())
    } else {
        bad_request(err.body_text())
    }
}

// ============ Calculators ============

/// Calculator reply: the result, or a flat `{"error": "..."}` body.
#[derive(Serialize)]
#[serde(untagged)]
enum CalcResponse<T> {
    Ok(T),
    Err { error: String },
}

impl<T> From<jeongirit_core::Result<T>> for CalcResponse<T> {
    fn from(result: jeongirit_core::Result<T>) -> Self {
        match result {
            Ok(value) => CalcResponse::Ok(value),
            Err(jeongirit_core::Error::InvalidArgument(message)) => CalcResponse::Err { error: message },
            Err(other) => CalcResponse::Err {
                error: other.to_string(),
            },
        }
    }
}

async fn handle_ohms_law(ApiJson(input): ApiJson<OhmsLawInput>) -> Json<CalcResponse<OhmsLawSolution>> {
    Json(calc::solve_ohms_law(&input).into())
}

#[derive(Deserialize)]
struct Resistances {
    values: Vec<f64>,
}

#[derive(Serialize)]
struct ResistanceTotal {
    #[serde(rename = "R_total")]
    r_total: f64,
}

async fn handle_series(ApiJson(req): ApiJson<Resistances>) -> Json<ResistanceTotal> {
    Json(ResistanceTotal {
        r_total: calc::series_resistance(&req.values),
    })
}

async fn handle_parallel(ApiJson(req): ApiJson<Resistances>) -> Json<ResistanceTotal> {
    Json(ResistanceTotal {
        r_total: calc::parallel_resistance(&req.values),
    })
}

async fn handle_rlc(ApiJson(input): ApiJson<RlcInput>) -> Json<RlcOutput> {
    Json(calc::rlc_impedance(&input))
}

#[derive(Deserialize)]
struct ResistorColorRequest {
    ohms: f64,
}

#[derive(Serialize)]
struct ResistorBands {
    bands: [&'static str; 4],
}

async fn handle_resistor_color(
    ApiJson(req): ApiJson<ResistorColorRequest>,
) -> Json<CalcResponse<ResistorBands>> {
    Json(calc::resistor_bands(req.ohms).map(|bands| ResistorBands { bands }).into())
}

#[derive(Deserialize)]
struct CircuitProblemQuery {
    /// `png` (default) or `svg`.
    #[serde(default)]
    format: Option<String>,
}

async fn handle_circuit_problem(
    Query(query): Query<CircuitProblemQuery>,
) -> Result<Json<CircuitProblem>, AppError> {
    let format = match query.format.as_deref() {
        Some(name) => name.parse::<SchematicFormat>()?,
        None => SchematicFormat::default(),
    };
    let problem = circuit::generate(&mut rand::thread_rng(), format)?;
    Ok(Json(problem))
}
