use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::generation::task::{Candidate, Violation};
use crate::ingest::IngestionError;
use crate::llm_client::GenerationError;
use crate::retrieval::EmbeddingError;

/// Error type of the core pipeline.
///
/// Infrastructure failures (embedding, generation) are kept apart from validation
/// exhaustion so callers can apply their own retry policy to the former only.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no compliant candidate after {attempts} attempts ({} unmet constraints)", .violations.len())]
    ValidationExhausted {
        attempts: u32,
        candidate: Box<Candidate>,
        violations: Vec<Violation>,
    },

    #[error("generation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        match self {
            PipelineError::Embedding(e) => e.is_timeout(),
            PipelineError::Generation(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Pipeline(e) => pipeline_status(e),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn pipeline_status(e: &PipelineError) -> (StatusCode, &'static str, String) {
    match e {
        PipelineError::Ingestion(_) => (StatusCode::BAD_REQUEST, "INGESTION_ERROR", e.to_string()),
        PipelineError::Config(_) => (StatusCode::BAD_REQUEST, "CONFIG_ERROR", e.to_string()),
        _ if e.is_timeout() => {
            tracing::error!("Provider timeout: {e}");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "PROVIDER_TIMEOUT",
                "An upstream AI provider timed out".to_string(),
            )
        }
        PipelineError::Embedding(_) => {
            tracing::error!("Embedding error: {e}");
            (
                StatusCode::BAD_GATEWAY,
                "EMBEDDING_ERROR",
                "The embedding provider failed".to_string(),
            )
        }
        PipelineError::Generation(_) => {
            tracing::error!("Generation error: {e}");
            (
                StatusCode::BAD_GATEWAY,
                "GENERATION_ERROR",
                "The generation provider failed".to_string(),
            )
        }
        PipelineError::ValidationExhausted { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_EXHAUSTED",
            e.to_string(),
        ),
        PipelineError::Cancelled { .. } => (StatusCode::CONFLICT, "CANCELLED", e.to_string()),
    }
}
