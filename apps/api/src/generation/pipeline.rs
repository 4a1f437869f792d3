//! Pipeline — the core entry points: build an index, extract a style, generate a task.
//!
//! Build phase runs once per document set. Afterwards the index and style are only read,
//! so any number of `generate` calls may share them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{validate_max_retries, ConfigError, Settings};
use crate::errors::PipelineError;
use crate::generation::generator::CandidateGenerator;
use crate::generation::retry::{CancellationFlag, GenerationOutcome, RetryController};
use crate::generation::task::GenerationTask;
use crate::generation::validator::CandidateValidator;
use crate::ingest::Document;
use crate::retrieval::{retrieve_many, Context, Embedder, VectorIndex};
use crate::style::{self, StyleDescriptor};

/// One generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    /// Attempt budget; the configured default when absent.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Extra retrieval query appended to the task's fixed query set.
    #[serde(default)]
    pub focus: Option<String>,
    /// Restricts retrieval to chunks whose source tag contains one of these.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl GenerationRequest {
    pub fn new(task: GenerationTask) -> Self {
        Self {
            task,
            max_retries: None,
            focus: None,
            sources: Vec::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Controller outcome plus the context every attempt was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub outcome: GenerationOutcome,
    pub context: Context,
}

/// Explicit configuration object: providers and settings, built once and shared.
#[derive(Clone)]
pub struct Pipeline {
    embedder: Embedder,
    generator: Arc<dyn CandidateGenerator>,
    validator: Arc<dyn CandidateValidator>,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        embedder: Embedder,
        generator: Arc<dyn CandidateGenerator>,
        validator: Arc<dyn CandidateValidator>,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            embedder,
            generator,
            validator,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn build_index(&self, documents: &[Document]) -> Result<VectorIndex, PipelineError> {
        crate::retrieval::build_index(documents, &self.embedder, &self.settings.chunking).await
    }

    /// Retrieves context for the task, then runs the validate/retry loop.
    ///
    /// Configuration problems fail before any provider call. An empty context is not an
    /// error: the generator is told no source material cleared the threshold.
    pub async fn generate(
        &self,
        index: &VectorIndex,
        style: &StyleDescriptor,
        request: &GenerationRequest,
        cancel: CancellationFlag,
    ) -> Result<GenerationRun, PipelineError> {
        let max_retries = request
            .max_retries
            .unwrap_or(self.settings.generation.max_retries);
        validate_max_retries(max_retries)?;
        request.task.validate()?;

        let task_type = request.task.task_type();
        let mut queries = request.task.retrieval_queries();
        if let Some(focus) = request.focus.as_deref().map(str::trim) {
            if !focus.is_empty() {
                queries.push(focus.to_string());
            }
        }
        let queries: Vec<&str> = queries.iter().map(String::as_str).collect();

        let context = retrieve_many(
            &queries,
            &request.sources,
            index,
            &self.embedder,
            &self.settings.retrieval,
        )
        .await?;
        if context.is_empty() {
            info!("No context cleared the threshold for {task_type}; generating from task instructions only");
        }

        let controller =
            RetryController::new(self.generator.as_ref(), self.validator.as_ref(), max_retries)?
                .with_cancellation(cancel);
        let outcome = controller.run(&request.task, &context, style).await?;

        info!(
            "{} finished as {:?} after {} attempts",
            task_type,
            outcome.terminal_state,
            outcome.attempts_used()
        );
        Ok(GenerationRun { outcome, context })
    }
}

/// Derives the StyleDescriptor shared by every generation in a session.
pub fn extract_style(sample_text: &str) -> StyleDescriptor {
    style::extract(sample_text)
}
