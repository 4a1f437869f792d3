//! Retry Controller — the sequential generate → validate loop for one task.
//!
//! States: Pending → Generating → Validating → {Accepted, Retrying, Exhausted},
//! Retrying → Generating, and Cancelled from Pending or Retrying.
//!
//! Only validation failures are retried. Provider errors end the run immediately.
//! Each attempt's prompt carries the previous attempt's draft and violations, so attempts
//! never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::validate_max_retries;
use crate::errors::PipelineError;
use crate::generation::generator::CandidateGenerator;
use crate::generation::task::{Attempt, Candidate, GenerationTask, ValidationResult};
use crate::generation::validator::CandidateValidator;
use crate::retrieval::Context;
use crate::style::StyleDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Pending,
    Generating,
    Validating,
    Retrying,
    Accepted,
    Exhausted,
    Cancelled,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Accepted | RetryState::Exhausted | RetryState::Cancelled
        )
    }

    fn can_transition_to(self, next: RetryState) -> bool {
        use RetryState::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Pending, Cancelled)
                | (Generating, Validating)
                | (Validating, Accepted)
                | (Validating, Retrying)
                | (Validating, Exhausted)
                | (Retrying, Generating)
                | (Retrying, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Accepted,
    Exhausted,
    Cancelled,
}

/// Cooperative cancellation, checked before every new provider call.
/// An in-flight call is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one controller run: terminal state, every attempt, and the full state trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub terminal_state: TerminalState,
    pub attempts: Vec<Attempt>,
    pub trace: Vec<RetryState>,
}

impl GenerationOutcome {
    pub fn attempts_used(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// The accepted candidate, or the final non-compliant one.
    pub fn candidate(&self) -> Option<&Candidate> {
        self.last_attempt().map(|a| &a.candidate)
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.last_attempt().map(|a| &a.validation)
    }

    /// Accepted → the final attempt. Exhausted and Cancelled become errors that still
    /// carry the best-effort draft where one exists.
    pub fn into_result(mut self) -> Result<Attempt, PipelineError> {
        let attempts = self.attempts_used();
        match (self.terminal_state, self.attempts.pop()) {
            (TerminalState::Accepted, Some(last)) => Ok(last),
            (TerminalState::Exhausted, Some(last)) => Err(PipelineError::ValidationExhausted {
                attempts,
                candidate: Box::new(last.candidate),
                violations: last.validation.violations,
            }),
            _ => Err(PipelineError::Cancelled { attempts }),
        }
    }
}

struct StateMachine {
    state: RetryState,
    trace: Vec<RetryState>,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            state: RetryState::Pending,
            trace: vec![RetryState::Pending],
        }
    }

    fn advance(&mut self, next: RetryState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        self.trace.push(next);
    }
}

pub struct RetryController<'a> {
    generator: &'a dyn CandidateGenerator,
    validator: &'a dyn CandidateValidator,
    max_retries: u32,
    cancel: CancellationFlag,
}

impl<'a> RetryController<'a> {
    /// `max_retries` is the total attempt budget and must be at least 1.
    pub fn new(
        generator: &'a dyn CandidateGenerator,
        validator: &'a dyn CandidateValidator,
        max_retries: u32,
    ) -> Result<Self, PipelineError> {
        validate_max_retries(max_retries)?;
        Ok(Self {
            generator,
            validator,
            max_retries,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(
        &self,
        task: &GenerationTask,
        context: &Context,
        style: &StyleDescriptor,
    ) -> Result<GenerationOutcome, PipelineError> {
        task.validate()?;

        let mut machine = StateMachine::new();
        let mut attempts: Vec<Attempt> = Vec::new();

        let terminal_state = loop {
            if self.cancel.is_cancelled() {
                info!(
                    "Generation of {} cancelled after {} attempts",
                    task.task_type(),
                    attempts.len()
                );
                machine.advance(RetryState::Cancelled);
                break TerminalState::Cancelled;
            }

            machine.advance(RetryState::Generating);
            let index = attempts.len() as u32 + 1;
            let feedback = attempts.last();
            let candidate = self
                .generator
                .generate(task, context, style, feedback)
                .await?;

            machine.advance(RetryState::Validating);
            let validation = self.validator.validate(task, &candidate);
            let passed = validation.passed;
            let violation_count = validation.violations.len();
            attempts.push(Attempt {
                index,
                candidate,
                validation,
            });

            if passed {
                machine.advance(RetryState::Accepted);
                info!(
                    "{} accepted on attempt {}/{}",
                    task.task_type(),
                    index,
                    self.max_retries
                );
                break TerminalState::Accepted;
            }

            if index >= self.max_retries {
                machine.advance(RetryState::Exhausted);
                warn!(
                    "{} exhausted after {} attempts; last attempt had {} violations",
                    task.task_type(),
                    index,
                    violation_count
                );
                break TerminalState::Exhausted;
            }

            warn!(
                "{} attempt {}/{} failed validation with {} violations, retrying",
                task.task_type(),
                index,
                self.max_retries,
                violation_count
            );
            machine.advance(RetryState::Retrying);
        };

        Ok(GenerationOutcome {
            terminal_state,
            attempts,
            trace: machine.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::GenerationSettings;
    use crate::generation::generator::Generator;
    use crate::generation::task::Violation;
    use crate::generation::validator::StructuralValidator;
    use crate::llm_client::{CompletionRequest, GenerationError, GenerationProvider};

    /// Emits a cover letter whose only paragraph records the attempt number.
    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicU32,
        feedback_seen: Mutex<Vec<Option<usize>>>,
        cancel_after: Option<(u32, CancellationFlag)>,
    }

    #[async_trait]
    impl CandidateGenerator for CountingGenerator {
        async fn generate(
            &self,
            _task: &GenerationTask,
            _context: &Context,
            _style: &StyleDescriptor,
            feedback: Option<&Attempt>,
        ) -> Result<Candidate, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.feedback_seen
                .lock()
                .unwrap()
                .push(feedback.map(|a| a.validation.violations.len()));
            if let Some((after, flag)) = &self.cancel_after {
                if n >= *after {
                    flag.cancel();
                }
            }
            Ok(Candidate::CoverLetter {
                paragraphs: vec![format!("attempt {n}")],
            })
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl CandidateGenerator for FailingGenerator {
        async fn generate(
            &self,
            _task: &GenerationTask,
            _context: &Context,
            _style: &StyleDescriptor,
            _feedback: Option<&Attempt>,
        ) -> Result<Candidate, GenerationError> {
            Err(GenerationError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    /// Replays canned provider responses in order and records every prompt.
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            Ok(self.replies.lock().unwrap().pop().unwrap_or_default())
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    /// Fails every attempt before `pass_on`.
    struct PassOnAttempt {
        pass_on: u32,
        seen: AtomicU32,
    }

    impl PassOnAttempt {
        fn new(pass_on: u32) -> Self {
            Self {
                pass_on,
                seen: AtomicU32::new(0),
            }
        }
    }

    impl CandidateValidator for PassOnAttempt {
        fn validate(&self, _task: &GenerationTask, _candidate: &Candidate) -> ValidationResult {
            let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.pass_on {
                ValidationResult::from_violations(Vec::new())
            } else {
                ValidationResult::from_violations(vec![Violation::new(
                    "paragraph_count",
                    format!("attempt {n} rejected"),
                )])
            }
        }
    }

    async fn run(
        generator: &dyn CandidateGenerator,
        validator: &dyn CandidateValidator,
        max_retries: u32,
        cancel: CancellationFlag,
    ) -> Result<GenerationOutcome, PipelineError> {
        RetryController::new(generator, validator, max_retries)?
            .with_cancellation(cancel)
            .run(
                &GenerationTask::cover_letter(),
                &Context::default(),
                &StyleDescriptor::default(),
            )
            .await
    }

    fn paragraph(candidate: Option<&Candidate>) -> String {
        match candidate {
            Some(Candidate::CoverLetter { paragraphs }) => paragraphs[0].clone(),
            other => panic!("unexpected candidate {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_accepted_on_attempt_n_with_budget_n() {
        let generator = CountingGenerator::default();
        let validator = PassOnAttempt::new(3);
        let outcome = run(&generator, &validator, 3, CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.terminal_state, TerminalState::Accepted);
        assert_eq!(outcome.attempts_used(), 3);
        assert_eq!(paragraph(outcome.candidate()), "attempt 3");
        assert!(outcome.validation().unwrap().passed);
    }

    #[tokio::test]
    async fn test_exhausted_returns_final_candidate() {
        let generator = CountingGenerator::default();
        let validator = PassOnAttempt::new(5);
        let outcome = run(&generator, &validator, 2, CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.terminal_state, TerminalState::Exhausted);
        assert_eq!(outcome.attempts_used(), 2);
        assert_eq!(paragraph(outcome.candidate()), "attempt 2");
        assert!(!outcome.validation().unwrap().passed);
    }

    #[tokio::test]
    async fn test_feedback_passed_only_after_failure() {
        let generator = CountingGenerator::default();
        let validator = PassOnAttempt::new(3);
        run(&generator, &validator, 3, CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(
            *generator.feedback_seen.lock().unwrap(),
            vec![None, Some(1), Some(1)]
        );
    }

    #[tokio::test]
    async fn test_unparseable_response_is_retried_to_acceptance() {
        let bullets: Vec<_> = (0..8)
            .map(|i| serde_json::json!({"heading": "Team Leadership", "body": format!("Led initiative {i}.")}))
            .collect();
        let skills: Vec<_> = (0..10).map(|i| format!("Skill {i}")).collect();
        let valid = serde_json::json!({
            "summary": "Engineering leader scaling payments platforms.",
            "bullets": bullets,
            "skills": skills,
        })
        .to_string();
        let truncated = r#"{"summary": "Engineering leader", "bullets": [{"heading": "Team"#;

        let provider = Arc::new(ScriptedProvider::new(&[truncated, valid.as_str()]));
        let generator = Generator::new(
            provider.clone(),
            &GenerationSettings::default(),
            Duration::from_secs(5),
        );
        let outcome = RetryController::new(&generator, &StructuralValidator, 3)
            .unwrap()
            .run(
                &GenerationTask::summary_package(),
                &Context::default(),
                &StyleDescriptor::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.terminal_state, TerminalState::Accepted);
        assert_eq!(outcome.attempts_used(), 2);
        assert!(outcome.attempts[0].candidate.is_parse_failed());
        assert_eq!(outcome.attempts[0].validation.violations[0].constraint, "structure");
        assert!(outcome.validation().unwrap().passed);

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains(truncated));
    }

    #[tokio::test]
    async fn test_state_trace() {
        let generator = CountingGenerator::default();
        let validator = PassOnAttempt::new(2);
        let outcome = run(&generator, &validator, 3, CancellationFlag::new())
            .await
            .unwrap();
        use RetryState::*;
        assert_eq!(
            outcome.trace,
            vec![
                Pending, Generating, Validating, Retrying, Generating, Validating, Accepted
            ]
        );
        assert!(outcome.trace.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let validator = PassOnAttempt::new(1);
        let err = run(&FailingGenerator, &validator, 3, CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        assert_eq!(validator.seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_is_config_error() {
        let generator = CountingGenerator::default();
        let err = run(&generator, &PassOnAttempt::new(1), 0, CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start_makes_no_call() {
        let generator = CountingGenerator::default();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let outcome = run(&generator, &PassOnAttempt::new(1), 3, cancel)
            .await
            .unwrap();
        assert_eq!(outcome.terminal_state, TerminalState::Cancelled);
        assert_eq!(outcome.attempts_used(), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome.into_result(),
            Err(PipelineError::Cancelled { attempts: 0 })
        ));
    }

    #[tokio::test]
    async fn test_cancel_between_attempts() {
        let cancel = CancellationFlag::new();
        let generator = CountingGenerator {
            cancel_after: Some((1, cancel.clone())),
            ..CountingGenerator::default()
        };
        let outcome = run(&generator, &PassOnAttempt::new(3), 3, cancel)
            .await
            .unwrap();
        assert_eq!(outcome.terminal_state, TerminalState::Cancelled);
        assert_eq!(outcome.attempts_used(), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.trace.last(), Some(&RetryState::Cancelled));
    }

    #[tokio::test]
    async fn test_into_result_carries_violations_on_exhaustion() {
        let generator = CountingGenerator::default();
        let outcome = run(&generator, &PassOnAttempt::new(9), 1, CancellationFlag::new())
            .await
            .unwrap();
        match outcome.into_result() {
            Err(PipelineError::ValidationExhausted {
                attempts,
                candidate,
                violations,
            }) => {
                assert_eq!(attempts, 1);
                assert_eq!(paragraph(Some(candidate.as_ref())), "attempt 1");
                assert_eq!(violations[0].message, "attempt 1 rejected");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
