// Constrained generation: prompt → candidate → validation → retry.
// All provider calls go through llm_client; nothing here talks HTTP directly.

pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod task;
pub mod validator;

pub use generator::{CandidateGenerator, Generator};
pub use pipeline::{extract_style, GenerationRequest, GenerationRun, Pipeline};
pub use retry::{CancellationFlag, GenerationOutcome, RetryController, RetryState, TerminalState};
pub use task::{Attempt, Candidate, GenerationTask, TaskType, ValidationResult, Violation};
pub use validator::{CandidateValidator, StructuralValidator};
