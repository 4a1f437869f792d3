//! Axum route handlers for the Session API.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::{
    extract_style, Attempt, CancellationFlag, Candidate, GenerationRequest, RetryState,
    TerminalState, ValidationResult,
};
use crate::ingest::Document;
use crate::session::store::{Session, SessionSummary};
use crate::state::AppState;
use crate::style::StyleDescriptor;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub documents: Vec<Document>,
    /// Sample CV to mine formatting conventions from. Defaults apply when absent.
    #[serde(default)]
    pub sample_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub session_id: Uuid,
    pub terminal_state: TerminalState,
    pub attempts_used: u32,
    /// Accepted candidate, or the flagged final draft when exhausted.
    pub candidate: Option<Candidate>,
    pub validation: Option<ValidationResult>,
    pub attempts: Vec<Attempt>,
    pub trace: Vec<RetryState>,
    pub context_chars: usize,
    pub source_distribution: BTreeMap<String, usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Chunks and embeds the documents, extracts the style, and stores the result.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    let index = state.pipeline.build_index(&request.documents).await?;
    let style = request
        .sample_text
        .as_deref()
        .map(extract_style)
        .unwrap_or_else(StyleDescriptor::default);

    let sources = request
        .documents
        .iter()
        .map(|d| d.source.trim().to_string())
        .collect();
    let session = state
        .sessions
        .insert(Session::new(sources, index, style))
        .await;

    info!(
        "Created session {} ({} chunks)",
        session.id,
        session.index.len()
    );
    Ok((StatusCode::CREATED, Json(session.summary())))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    Ok(Json(session.summary()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        info!("Deleted session {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/generate
///
/// Runs one task against the session. Exhaustion is not an HTTP error: the response
/// carries `terminal_state: "exhausted"` with the flagged draft and its violations.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;

    let run = state
        .pipeline
        .generate(
            &session.index,
            &session.style,
            &request,
            CancellationFlag::new(),
        )
        .await?;

    let outcome = run.outcome;
    Ok(Json(GenerateResponse {
        session_id: id,
        terminal_state: outcome.terminal_state,
        attempts_used: outcome.attempts_used(),
        candidate: outcome.candidate().cloned(),
        validation: outcome.validation().cloned(),
        context_chars: run.context.total_chars,
        source_distribution: run.context.source_distribution(),
        attempts: outcome.attempts,
        trace: outcome.trace,
    }))
}
