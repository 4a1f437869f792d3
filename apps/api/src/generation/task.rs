use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

// ────────────────────────────────────────────────────────────────────────────
// Tasks and their constraints
// ────────────────────────────────────────────────────────────────────────────

const COMPANY_CULTURE_QUERY: &str = "company culture, mission and values";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SummaryPackage,
    CoverLetter,
}

impl TaskType {
    /// Fixed retrieval queries used to gather context for this task.
    pub fn retrieval_queries(&self) -> &'static [&'static str] {
        match self {
            TaskType::SummaryPackage => &[
                "job requirements, responsibilities and qualifications",
                "professional experience, leadership and measurable achievements",
                "technical skills, tools and competencies",
            ],
            TaskType::CoverLetter => &[
                "job requirements and responsibilities",
                COMPANY_CULTURE_QUERY,
                "relevant achievements and experience",
            ],
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::SummaryPackage => write!(f, "summary package"),
            TaskType::CoverLetter => write!(f, "cover letter"),
        }
    }
}

/// Structural limits for the summary + SAR bullets + skills package.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvPackageConstraints {
    pub summary_max_words: usize,
    pub bullet_count: usize,
    pub heading_words: usize,
    pub skill_count: usize,
    pub skill_max_words: usize,
    /// Inclusive word range for each bullet body. Unchecked when `None`.
    pub bullet_body_words: Option<(usize, usize)>,
}

impl Default for CvPackageConstraints {
    fn default() -> Self {
        Self {
            summary_max_words: 40,
            bullet_count: 8,
            heading_words: 2,
            skill_count: 10,
            skill_max_words: 2,
            bullet_body_words: None,
        }
    }
}

impl CvPackageConstraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("summary_max_words", self.summary_max_words),
            ("bullet_count", self.bullet_count),
            ("heading_words", self.heading_words),
            ("skill_count", self.skill_count),
            ("skill_max_words", self.skill_max_words),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if let Some((min, max)) = self.bullet_body_words {
            if min == 0 || min > max {
                return Err(ConfigError::invalid(
                    "bullet_body_words",
                    format!("invalid range {min}-{max}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverLetterConstraints {
    pub min_paragraphs: usize,
    pub max_paragraphs: usize,
    pub max_words: usize,
}

impl Default for CoverLetterConstraints {
    fn default() -> Self {
        Self {
            min_paragraphs: 3,
            max_paragraphs: 4,
            max_words: 250,
        }
    }
}

impl CoverLetterConstraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_paragraphs == 0 || self.min_paragraphs > self.max_paragraphs {
            return Err(ConfigError::invalid(
                "paragraphs",
                format!(
                    "invalid range {}-{}",
                    self.min_paragraphs, self.max_paragraphs
                ),
            ));
        }
        if self.max_words == 0 {
            return Err(ConfigError::invalid("max_words", "must be at least 1"));
        }
        Ok(())
    }
}

/// One user-initiated generation request. Each variant carries its own constraint schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum GenerationTask {
    SummaryPackage {
        #[serde(default)]
        constraints: CvPackageConstraints,
    },
    CoverLetter {
        #[serde(default)]
        constraints: CoverLetterConstraints,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        company_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role_title: Option<String>,
    },
}

impl GenerationTask {
    pub fn summary_package() -> Self {
        GenerationTask::SummaryPackage {
            constraints: CvPackageConstraints::default(),
        }
    }

    pub fn cover_letter() -> Self {
        GenerationTask::CoverLetter {
            constraints: CoverLetterConstraints::default(),
            company_name: None,
            role_title: None,
        }
    }

    /// Cover letter addressed to a named company and role.
    pub fn cover_letter_for(company_name: impl Into<String>, role_title: impl Into<String>) -> Self {
        GenerationTask::CoverLetter {
            constraints: CoverLetterConstraints::default(),
            company_name: Some(company_name.into()),
            role_title: Some(role_title.into()),
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            GenerationTask::SummaryPackage { .. } => TaskType::SummaryPackage,
            GenerationTask::CoverLetter { .. } => TaskType::CoverLetter,
        }
    }

    /// The task type's fixed queries. A named company replaces the generic culture query.
    pub fn retrieval_queries(&self) -> Vec<String> {
        let company = match self {
            GenerationTask::CoverLetter { company_name, .. } => company_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty()),
            GenerationTask::SummaryPackage { .. } => None,
        };
        self.task_type()
            .retrieval_queries()
            .iter()
            .map(|query| match company {
                Some(name) if *query == COMPANY_CULTURE_QUERY => {
                    format!("{name} culture, mission and values")
                }
                _ => query.to_string(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            GenerationTask::SummaryPackage { constraints } => constraints.validate(),
            GenerationTask::CoverLetter { constraints, .. } => constraints.validate(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidates and validation results
// ────────────────────────────────────────────────────────────────────────────

/// An achievement statement: two-word heading plus situation-action-result body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarBullet {
    pub heading: String,
    pub body: String,
}

/// One attempt's structured output.
///
/// `ParseFailed` stands in for a response that could not be read into the task's shape.
/// It is never an error: the validator turns it into a `structure` violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Candidate {
    SummaryPackage {
        summary: String,
        bullets: Vec<SarBullet>,
        skills: Vec<String>,
    },
    CoverLetter {
        paragraphs: Vec<String>,
    },
    ParseFailed {
        task_type: TaskType,
        reason: String,
        raw: String,
    },
}

impl Candidate {
    pub fn is_parse_failed(&self) -> bool {
        matches!(self, Candidate::ParseFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub constraint: String,
    pub message: String,
}

impl Violation {
    pub fn new(constraint: &str, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based.
    pub index: u32,
    pub candidate: Candidate,
    pub validation: ValidationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_with_default_constraints() {
        let task: GenerationTask =
            serde_json::from_value(serde_json::json!({"task_type": "summary_package"})).unwrap();
        assert_eq!(task, GenerationTask::summary_package());
    }

    #[test]
    fn test_task_partial_constraints_override() {
        let task: GenerationTask = serde_json::from_value(serde_json::json!({
            "task_type": "cover_letter",
            "constraints": {"max_words": 300}
        }))
        .unwrap();
        match task {
            GenerationTask::CoverLetter {
                constraints,
                company_name,
                role_title,
            } => {
                assert_eq!(constraints.max_words, 300);
                assert_eq!(constraints.min_paragraphs, 3);
                assert_eq!(company_name, None);
                assert_eq!(role_title, None);
            }
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn test_invalid_constraints_rejected() {
        let task = GenerationTask::CoverLetter {
            constraints: CoverLetterConstraints {
                min_paragraphs: 5,
                max_paragraphs: 4,
                max_words: 250,
            },
            company_name: None,
            role_title: None,
        };
        assert!(task.validate().is_err());

        let task = GenerationTask::SummaryPackage {
            constraints: CvPackageConstraints {
                bullet_body_words: Some((35, 22)),
                ..CvPackageConstraints::default()
            },
        };
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_candidate_is_tagged_by_kind() {
        let candidate = Candidate::CoverLetter {
            paragraphs: vec!["One.".to_string()],
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["kind"], "cover_letter");
    }

    #[test]
    fn test_every_task_has_queries() {
        assert_eq!(TaskType::SummaryPackage.retrieval_queries().len(), 3);
        assert_eq!(TaskType::CoverLetter.retrieval_queries().len(), 3);
    }

    #[test]
    fn test_cover_letter_reads_company_and_role() {
        let task: GenerationTask = serde_json::from_value(serde_json::json!({
            "task_type": "cover_letter",
            "company_name": "TechCorp",
            "role_title": "Engineering Manager"
        }))
        .unwrap();
        assert_eq!(
            task,
            GenerationTask::cover_letter_for("TechCorp", "Engineering Manager")
        );
    }

    #[test]
    fn test_company_name_replaces_culture_query() {
        let queries = GenerationTask::cover_letter_for("TechCorp", "Engineering Manager")
            .retrieval_queries();
        assert_eq!(queries.len(), 3);
        assert!(queries.contains(&"TechCorp culture, mission and values".to_string()));
        assert!(!queries.iter().any(|q| q.starts_with("company culture")));

        let generic = GenerationTask::cover_letter().retrieval_queries();
        assert!(generic.contains(&"company culture, mission and values".to_string()));
    }
}
