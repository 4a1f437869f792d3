//! Structural validation of candidates. Pure and stateless: every unmet constraint is
//! reported, not just the first one found.

use crate::generation::task::{
    Candidate, CoverLetterConstraints, CvPackageConstraints, GenerationTask, SarBullet,
    ValidationResult, Violation,
};

pub const SUMMARY_WORD_COUNT: &str = "summary_word_count";
pub const BULLET_COUNT: &str = "bullet_count";
pub const BULLET_HEADING_WORDS: &str = "bullet_heading_words";
pub const BULLET_BODY_WORDS: &str = "bullet_body_words";
pub const SKILL_COUNT: &str = "skill_count";
pub const SKILL_WORD_COUNT: &str = "skill_word_count";
pub const PARAGRAPH_COUNT: &str = "paragraph_count";
pub const TOTAL_WORD_COUNT: &str = "total_word_count";
pub const STRUCTURE: &str = "structure";

/// Checks a candidate against its task's constraints.
pub trait CandidateValidator: Send + Sync {
    fn validate(&self, task: &GenerationTask, candidate: &Candidate) -> ValidationResult;
}

/// The default validator: word and item counts only, no semantic checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl CandidateValidator for StructuralValidator {
    fn validate(&self, task: &GenerationTask, candidate: &Candidate) -> ValidationResult {
        validate(task, candidate)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn words(n: usize) -> String {
    if n == 1 {
        "1 word".to_string()
    } else {
        format!("{n} words")
    }
}

pub fn validate(task: &GenerationTask, candidate: &Candidate) -> ValidationResult {
    let violations = match (task, candidate) {
        (_, Candidate::ParseFailed { task_type, reason, .. }) => vec![Violation::new(
            STRUCTURE,
            format!("response could not be parsed as a {task_type}: {reason}"),
        )],
        (
            GenerationTask::SummaryPackage { constraints },
            Candidate::SummaryPackage {
                summary,
                bullets,
                skills,
            },
        ) => check_cv_package(constraints, summary, bullets, skills),
        (GenerationTask::CoverLetter { constraints, .. }, Candidate::CoverLetter { paragraphs }) => {
            check_cover_letter(constraints, paragraphs)
        }
        (task, _) => vec![Violation::new(
            STRUCTURE,
            format!("candidate does not have the shape of a {}", task.task_type()),
        )],
    };
    ValidationResult::from_violations(violations)
}

fn check_cv_package(
    c: &CvPackageConstraints,
    summary: &str,
    bullets: &[SarBullet],
    skills: &[String],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    let summary_words = word_count(summary);
    if summary_words > c.summary_max_words {
        violations.push(Violation::new(
            SUMMARY_WORD_COUNT,
            format!(
                "summary has {}, exceeding the {}-word limit by {}",
                words(summary_words),
                c.summary_max_words,
                words(summary_words - c.summary_max_words)
            ),
        ));
    }

    if bullets.len() != c.bullet_count {
        violations.push(Violation::new(
            BULLET_COUNT,
            format!(
                "expected exactly {} bullets, got {}",
                c.bullet_count,
                bullets.len()
            ),
        ));
    }

    for (i, bullet) in bullets.iter().enumerate() {
        let heading_words = word_count(&bullet.heading);
        if heading_words != c.heading_words {
            violations.push(Violation::new(
                BULLET_HEADING_WORDS,
                format!(
                    "bullet {} heading '{}' has {}, expected exactly {}",
                    i + 1,
                    bullet.heading,
                    words(heading_words),
                    c.heading_words
                ),
            ));
        }
        if let Some((min, max)) = c.bullet_body_words {
            let body_words = word_count(&bullet.body);
            if !(min..=max).contains(&body_words) {
                violations.push(Violation::new(
                    BULLET_BODY_WORDS,
                    format!(
                        "bullet {} body has {}, outside the {min}-{max} word range",
                        i + 1,
                        words(body_words)
                    ),
                ));
            }
        }
    }

    if skills.len() != c.skill_count {
        violations.push(Violation::new(
            SKILL_COUNT,
            format!(
                "expected exactly {} skills, got {}",
                c.skill_count,
                skills.len()
            ),
        ));
    }

    for (i, skill) in skills.iter().enumerate() {
        let skill_words = word_count(skill);
        if skill_words > c.skill_max_words {
            violations.push(Violation::new(
                SKILL_WORD_COUNT,
                format!(
                    "skill {} '{}' has {}, exceeding the {}-word limit by {}",
                    i + 1,
                    skill,
                    words(skill_words),
                    c.skill_max_words,
                    words(skill_words - c.skill_max_words)
                ),
            ));
        }
    }

    violations
}

fn check_cover_letter(c: &CoverLetterConstraints, paragraphs: &[String]) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !(c.min_paragraphs..=c.max_paragraphs).contains(&paragraphs.len()) {
        violations.push(Violation::new(
            PARAGRAPH_COUNT,
            format!(
                "cover letter has {} paragraphs, expected between {} and {}",
                paragraphs.len(),
                c.min_paragraphs,
                c.max_paragraphs
            ),
        ));
    }

    let total: usize = paragraphs.iter().map(|p| word_count(p)).sum();
    if total > c.max_words {
        violations.push(Violation::new(
            TOTAL_WORD_COUNT,
            format!(
                "cover letter has {}, exceeding the {}-word limit by {}",
                words(total),
                c.max_words,
                words(total - c.max_words)
            ),
        ));
    }

    violations
}
