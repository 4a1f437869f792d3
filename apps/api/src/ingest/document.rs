use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed or empty input. Raised before any chunking or provider call and never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestionError {
    #[error("no documents supplied")]
    NoDocuments,

    #[error("document #{index} has a blank source tag")]
    BlankSource { index: usize },

    #[error("document '{tag}' is empty after cleaning")]
    EmptyDocument { tag: String },

    #[error("source tag '{tag}' appears more than once")]
    DuplicateSource { tag: String },
}

/// Plain extracted text plus the tag naming where it came from
/// (e.g. `job_description`, `experience_superset`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Returns a copy with cleaned text, or an error if nothing usable remains.
    pub fn cleaned(&self, index: usize) -> Result<Document, IngestionError> {
        let source = self.source.trim();
        if source.is_empty() {
            return Err(IngestionError::BlankSource { index });
        }
        let text = clean_text(&self.text);
        if text.is_empty() {
            return Err(IngestionError::EmptyDocument {
                tag: source.to_string(),
            });
        }
        Ok(Document {
            source: source.to_string(),
            text,
        })
    }
}

/// Cleans and checks a whole document set. Source tags must be unique within one build.
pub fn prepare_documents(documents: &[Document]) -> Result<Vec<Document>, IngestionError> {
    if documents.is_empty() {
        return Err(IngestionError::NoDocuments);
    }

    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(documents.len());
    for (index, document) in documents.iter().enumerate() {
        let cleaned = document.cleaned(index)?;
        if !seen.insert(cleaned.source.to_lowercase()) {
            return Err(IngestionError::DuplicateSource {
                tag: cleaned.source,
            });
        }
        prepared.push(cleaned);
    }
    Ok(prepared)
}

/// Strips NUL bytes, trims every line and drops blank ones.
pub fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_trims_and_drops_blank_lines() {
        let raw = "  Senior Engineer \n\n\t\n Led team of 5\0 \n";
        assert_eq!(clean_text(raw), "Senior Engineer\nLed team of 5");
    }

    #[test]
    fn test_empty_document_rejected() {
        let docs = vec![Document::new("job_description", " \n\0\n ")];
        let err = prepare_documents(&docs).unwrap_err();
        assert_eq!(
            err,
            IngestionError::EmptyDocument {
                tag: "job_description".to_string()
            }
        );
    }

    #[test]
    fn test_blank_source_rejected() {
        let docs = vec![Document::new("   ", "text")];
        assert_eq!(
            prepare_documents(&docs).unwrap_err(),
            IngestionError::BlankSource { index: 0 }
        );
    }

    #[test]
    fn test_duplicate_source_rejected_case_insensitively() {
        let docs = vec![
            Document::new("superset", "one"),
            Document::new("Superset", "two"),
        ];
        assert_eq!(
            prepare_documents(&docs),
            Err(IngestionError::DuplicateSource {
                tag: "Superset".to_string()
            })
        );
    }

    #[test]
    fn test_error_messages_name_the_tag() {
        let err = IngestionError::EmptyDocument {
            tag: "experience".to_string(),
        };
        assert_eq!(err.to_string(), "document 'experience' is empty after cleaning");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_no_documents_rejected() {
        assert_eq!(prepare_documents(&[]), Err(IngestionError::NoDocuments));
    }

    #[test]
    fn test_prepare_keeps_order() {
        let docs = vec![
            Document::new("job_description", "Rust engineer"),
            Document::new("experience", "Led team of 5"),
        ];
        let prepared = prepare_documents(&docs).unwrap();
        assert_eq!(prepared[0].source, "job_description");
        assert_eq!(prepared[1].text, "Led team of 5");
    }
}
