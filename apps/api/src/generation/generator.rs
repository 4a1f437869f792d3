//! Candidate Generation — prompt assembly and response parsing.
//!
//! Flow: task instructions + rendered context + style (summary package only)
//!       + corrective feedback → provider call → parse into a Candidate.
//!
//! A response that does not fit the task's shape becomes `Candidate::ParseFailed`.
//! Provider failures and timeouts are returned as `GenerationError` and never retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::GenerationSettings;
use crate::generation::prompts::{
    BULLET_BODY_FREE_RULE, BULLET_BODY_RANGE_RULE, COVER_LETTER_PROMPT_TEMPLATE,
    COVER_LETTER_SYSTEM, CV_PACKAGE_PROMPT_TEMPLATE, CV_PACKAGE_SYSTEM, FEEDBACK_TEMPLATE,
    NO_CONTEXT_NOTE, UNNAMED_COMPANY, UNNAMED_ROLE,
};
use crate::generation::task::{
    Attempt, Candidate, CoverLetterConstraints, CvPackageConstraints, GenerationTask, SarBullet,
};
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{strip_json_fences, CompletionRequest, GenerationError, GenerationProvider};
use crate::retrieval::Context;
use crate::style::StyleDescriptor;

const SUMMARY_PREFIXES: [&str; 3] = ["professional summary:", "executive summary:", "summary:"];
const LETTER_PREFIXES: [&str; 1] = ["cover letter:"];

/// Produces one candidate per call. The retry controller depends on this seam only.
///
/// `feedback` is the previous attempt (draft plus its validation) when that attempt failed.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(
        &self,
        task: &GenerationTask,
        context: &Context,
        style: &StyleDescriptor,
        feedback: Option<&Attempt>,
    ) -> Result<Candidate, GenerationError>;
}

/// Provider-backed generator at a fixed sampling temperature.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn GenerationProvider>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        settings: &GenerationSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        }
    }
}

#[async_trait]
impl CandidateGenerator for Generator {
    async fn generate(
        &self,
        task: &GenerationTask,
        context: &Context,
        style: &StyleDescriptor,
        feedback: Option<&Attempt>,
    ) -> Result<Candidate, GenerationError> {
        let prompt = build_prompt(task, context, style, feedback);
        let request = CompletionRequest {
            system: system_prompt(task),
            prompt: &prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            "Generating {} with {} ({} context chunks, feedback: {})",
            task.task_type(),
            self.provider.model(),
            context.chunks.len(),
            feedback.is_some()
        );

        let raw = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                after: self.timeout,
            })??;

        let candidate = parse_candidate(task, &raw);
        if let Candidate::ParseFailed { reason, .. } = &candidate {
            warn!("Could not parse {} response: {}", task.task_type(), reason);
        }
        Ok(candidate)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt assembly
// ────────────────────────────────────────────────────────────────────────────

fn system_prompt(task: &GenerationTask) -> &'static str {
    match task {
        GenerationTask::SummaryPackage { .. } => CV_PACKAGE_SYSTEM,
        GenerationTask::CoverLetter { .. } => COVER_LETTER_SYSTEM,
    }
}

/// Builds the user prompt. Style only shapes the summary package.
pub fn build_prompt(
    task: &GenerationTask,
    context: &Context,
    style: &StyleDescriptor,
    feedback: Option<&Attempt>,
) -> String {
    let rendered = if context.is_empty() {
        NO_CONTEXT_NOTE.to_string()
    } else {
        context.render()
    };

    let mut prompt = match task {
        GenerationTask::SummaryPackage { constraints } => {
            cv_package_prompt(constraints, &rendered, style)
        }
        GenerationTask::CoverLetter {
            constraints,
            company_name,
            role_title,
        } => cover_letter_prompt(
            constraints,
            company_name.as_deref(),
            role_title.as_deref(),
            &rendered,
        ),
    };

    if let Some(previous) = feedback.filter(|a| !a.validation.passed) {
        let violations = previous
            .validation
            .violations
            .iter()
            .map(|v| format!("- {}: {}", v.constraint, v.message))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str(
            &FEEDBACK_TEMPLATE
                .replace("{violations}", &violations)
                .replace("{previous}", &render_draft(&previous.candidate)),
        );
    }
    prompt
}

/// The previous draft in the shape the task asks for, so the provider can revise it.
fn render_draft(candidate: &Candidate) -> String {
    match candidate {
        Candidate::SummaryPackage {
            summary,
            bullets,
            skills,
        } => {
            let draft = json!({
                "summary": summary,
                "bullets": bullets
                    .iter()
                    .map(|b| json!({"heading": b.heading, "body": b.body}))
                    .collect::<Vec<_>>(),
                "skills": skills,
            });
            serde_json::to_string_pretty(&draft).unwrap_or_else(|_| draft.to_string())
        }
        Candidate::CoverLetter { paragraphs } => paragraphs.join("\n\n"),
        Candidate::ParseFailed { raw, .. } => raw.clone(),
    }
}

fn cv_package_prompt(c: &CvPackageConstraints, context: &str, style: &StyleDescriptor) -> String {
    let body_rule = match c.bullet_body_words {
        Some((min, max)) => BULLET_BODY_RANGE_RULE
            .replace("{min}", &min.to_string())
            .replace("{max}", &max.to_string()),
        None => BULLET_BODY_FREE_RULE.to_string(),
    };

    CV_PACKAGE_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{json_instruction}", JSON_ONLY_INSTRUCTION)
        .replace("{summary_max_words}", &c.summary_max_words.to_string())
        .replace("{bullet_count}", &c.bullet_count.to_string())
        .replace("{heading_words}", &c.heading_words.to_string())
        .replace("{bullet_body_rule}", &body_rule)
        .replace("{skill_count}", &c.skill_count.to_string())
        .replace("{skill_max_words}", &c.skill_max_words.to_string())
        .replace("{style}", &style.describe())
        .replace("{context}", context)
}

fn cover_letter_prompt(
    c: &CoverLetterConstraints,
    company_name: Option<&str>,
    role_title: Option<&str>,
    context: &str,
) -> String {
    let named = |value: Option<&str>, fallback: &'static str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };

    COVER_LETTER_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{company_name}", &named(company_name, UNNAMED_COMPANY))
        .replace("{role_title}", &named(role_title, UNNAMED_ROLE))
        .replace("{min_paragraphs}", &c.min_paragraphs.to_string())
        .replace("{max_paragraphs}", &c.max_paragraphs.to_string())
        .replace("{max_words}", &c.max_words.to_string())
        .replace("{context}", context)
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCvPackage {
    summary: String,
    bullets: Vec<RawBullet>,
    skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBullet {
    Structured { heading: String, body: String },
    Line(String),
}

/// Parses a raw provider response into the task's candidate shape.
///
/// A parsed summary package always holds exactly the task's bullet and skill counts;
/// anything short or long is a parse failure, as is a truncated response.
pub fn parse_candidate(task: &GenerationTask, raw: &str) -> Candidate {
    let parsed = match task {
        GenerationTask::SummaryPackage { constraints } => parse_cv_package(raw, constraints),
        GenerationTask::CoverLetter { .. } => parse_cover_letter(raw),
    };
    parsed.unwrap_or_else(|reason| Candidate::ParseFailed {
        task_type: task.task_type(),
        reason,
        raw: raw.to_string(),
    })
}

fn parse_cv_package(raw: &str, c: &CvPackageConstraints) -> Result<Candidate, String> {
    let json = strip_json_fences(raw);
    if json.is_empty() {
        return Err("empty response".to_string());
    }
    let package: RawCvPackage =
        serde_json::from_str(json).map_err(|e| format!("not a CV package object: {e}"))?;

    let bullets = package
        .bullets
        .into_iter()
        .enumerate()
        .map(|(i, b)| match b {
            RawBullet::Structured { heading, body } => Ok(SarBullet {
                heading: heading.replace('*', "").trim().to_string(),
                body: body.trim().to_string(),
            }),
            RawBullet::Line(line) => split_bullet_line(&line)
                .ok_or_else(|| format!("bullet {} has no 'Heading | body' separator", i + 1)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut skills: Vec<String> = Vec::with_capacity(package.skills.len());
    for skill in package.skills.iter().map(|s| clean_list_item(s)) {
        if !skill.is_empty() && !skills.iter().any(|s| s.eq_ignore_ascii_case(&skill)) {
            skills.push(skill);
        }
    }

    if bullets.len() != c.bullet_count {
        return Err(format!(
            "expected {} bullets, got {}",
            c.bullet_count,
            bullets.len()
        ));
    }
    if skills.len() != c.skill_count {
        return Err(format!(
            "expected {} distinct skills, got {}",
            c.skill_count,
            skills.len()
        ));
    }

    Ok(Candidate::SummaryPackage {
        summary: clean_summary(&package.summary),
        bullets,
        skills,
    })
}

/// Splits `**Heading** | body` (optionally bulleted) into its two parts.
fn split_bullet_line(line: &str) -> Option<SarBullet> {
    let line = clean_list_item(line);
    let (heading, body) = line.split_once('|')?;
    let heading = heading.replace('*', "").trim().to_string();
    let body = body.trim().trim_end_matches("**").trim().to_string();
    if heading.is_empty() || body.is_empty() {
        return None;
    }
    Some(SarBullet { heading, body })
}

/// Trims whitespace, a leading list glyph and `1.` / `1)` style numbering.
fn clean_list_item(item: &str) -> String {
    let item = item.trim();
    let item = item
        .strip_prefix(['•', '-', '*', '▪', '○', '→'])
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .unwrap_or(item)
        .trim_start();
    let digits = item.chars().take_while(char::is_ascii_digit).count();
    let item = if digits > 0 {
        item[digits..]
            .strip_prefix(['.', ')'])
            .map(str::trim_start)
            .unwrap_or(item)
    } else {
        item
    };
    item.trim().to_string()
}

fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return inner.trim();
        }
    }
    text
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        if text.len() >= prefix.len()
            && text.is_char_boundary(prefix.len())
            && text[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return text[prefix.len()..].trim_start();
        }
    }
    text
}

fn clean_summary(summary: &str) -> String {
    let summary = strip_wrapping_quotes(summary);
    let summary = strip_prefix_ignore_case(summary, &SUMMARY_PREFIXES);
    strip_wrapping_quotes(summary).to_string()
}

fn parse_cover_letter(raw: &str) -> Result<Candidate, String> {
    let text = strip_wrapping_quotes(raw);
    let text = strip_prefix_ignore_case(text, &LETTER_PREFIXES);
    let text = strip_wrapping_quotes(text);

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    if paragraphs.is_empty() {
        return Err("empty response".to_string());
    }
    Ok(Candidate::CoverLetter { paragraphs })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
