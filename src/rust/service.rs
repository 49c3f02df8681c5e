//! Inference service: HTTP front end over one loaded classifier.
//!
//! Routes:
//! - `POST /classify` with `{"text": "..."}` returns `{"label", "confidence", "scores"}`
//! - `GET /health` returns `{"status": "ok"}`
//! - `GET /` describes the loaded model
//!
//! Every error body has the shape `{"error": {"type": ..., "message": ...}}`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use crate::classifier::Classifier;
use crate::config::ServiceConfig;
use crate::error::ClassifierError;
use crate::text::NormalizeOptions;

/// Successful response of `POST /classify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub label: String,
    pub confidence: f32,
    pub scores: BTreeMap<String, f32>,
}

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    classifier: Arc<Classifier>,
    normalization: NormalizeOptions,
    max_text_chars: usize,
}

impl AppState {
    pub fn new(classifier: Classifier, normalization: NormalizeOptions, max_text_chars: usize) -> Self {
        Self {
            classifier: Arc::new(classifier),
            normalization,
            max_text_chars,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/classify", post(classify))
        .fallback(fallback)
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "sentiflow",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.classifier.info(),
        "normalization": state.normalization,
        "max_text_chars": state.max_text_chars,
    }))
}

async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let text = extract_text(&body, state.max_text_chars)?;
    let normalized = state.normalization.normalize(text);
    debug!("Classifying {} chars", normalized.chars().count());

    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classifier.predict(&normalized))
        .await
        .map_err(|e| {
            error!("Classification task failed: {}", e);
            AppError::InternalError("classification failed".into())
        })??;

    Ok(Json(ClassifyResponse {
        label: prediction.label,
        confidence: prediction.confidence,
        scores: prediction.scores,
    }))
}

/// Pulls a usable `text` field out of a request body.
fn extract_text(body: &Value, max_chars: usize) -> Result<&str, AppError> {
    let text = match body.get("text") {
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(AppError::InvalidRequest("`text` must be a string".into())),
        None => return Err(AppError::InvalidRequest("missing field `text`".into())),
    };
    if text.trim().is_empty() {
        return Err(AppError::InvalidRequest("Input text cannot be empty".into()));
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(AppError::InvalidRequest(format!(
            "Input text is too long ({} chars, max is {})",
            chars, max_chars
        )));
    }
    Ok(text)
}

async fn fallback() -> AppError {
    AppError::NotFound
}

/// Error handling
#[derive(Debug)]
enum AppError {
    InvalidRequest(String),
    NotFound,
    InternalError(String),
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ValidationError(msg) => AppError::InvalidRequest(msg),
            other => {
                error!("Request failed: {}", other);
                AppError::InternalError(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", "Not found".to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = json!({
            "error": {
                "type": kind,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

/// Normalization to apply to incoming text for `classifier`.
///
/// An explicitly configured value wins and is compared with what the
/// artifact records; otherwise the recorded normalization is used, so
/// requests are cleaned the way the training data was.
pub fn serving_normalization(classifier: &Classifier, configured: Option<NormalizeOptions>) -> NormalizeOptions {
    let trained_with = classifier.metadata().normalization;
    match configured {
        Some(configured) if configured != trained_with => {
            warn!(
                "Configured normalization ({}) differs from the one recorded at training time ({})",
                configured.describe(),
                trained_with.describe()
            );
            configured
        }
        Some(configured) => configured,
        None => trained_with,
    }
}

/// Loads the artifact and serves it until Ctrl-C or SIGTERM.
///
/// The artifact is loaded before the listener is bound, so a missing or
/// corrupt model stops startup without ever accepting a connection.
pub async fn serve(
    model: &Path,
    config: &ServiceConfig,
    normalization: Option<NormalizeOptions>,
) -> Result<(), ClassifierError> {
    config.validate()?;
    let classifier = Classifier::load(model)?;
    let normalization = serving_normalization(&classifier, normalization);
    info!(
        "Loaded {} model from {} with labels {:?}",
        classifier.algorithm(),
        model.display(),
        classifier.labels()
    );

    let state = AppState::new(classifier, normalization, config.max_text_chars);
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    run(listener, state, shutdown_signal()).await
}

/// Serves `state` on an already bound listener until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ClassifierError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
