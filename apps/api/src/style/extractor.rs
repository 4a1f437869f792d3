//! Style Extractor — reads formatting conventions off a sample CV.
//!
//! Pure text heuristics, no provider calls. Every field has a default, so an empty or
//! unrecognisable sample still yields a complete descriptor.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Recognised bullet glyphs, in reporting order.
pub const BULLET_GLYPHS: [char; 6] = ['•', '○', '▪', '→', '-', '*'];

const DEFAULT_GLYPH: char = '•';
const MAX_HEADING_CHARS: usize = 50;
const MAX_HEADING_WORDS: usize = 6;
const LOWERCASE_CONNECTORS: [&str; 8] = ["and", "of", "the", "for", "in", "to", "&", "a"];

macro_rules! style_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// ── Contact fields ─────────────────────────────────────────────────────────
style_pattern!(RE_EMAIL, r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}");
style_pattern!(
    RE_PHONE,
    r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"
);
style_pattern!(
    RE_LOCATION,
    r"\b[A-Z][a-z]+(?:\s[A-Z][a-z]+)*,\s*(?:[A-Z]{2}|[A-Z][a-z]+)\b"
);

// ── Date ranges (end token may be Present/Current) ─────────────────────────
style_pattern!(
    RE_DATE_SLASH,
    r"(?i)\b\d{1,2}/\d{4}\s*[-–]\s*(?:\d{1,2}/\d{4}|present|current)\b"
);
style_pattern!(
    RE_DATE_DOT,
    r"(?i)\b\d{1,2}\.\d{4}\s*[-–]\s*(?:\d{1,2}\.\d{4}|present|current)\b"
);
style_pattern!(
    RE_DATE_MONTH,
    r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}\s*[-–]\s*(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}|present|current)\b"
);
style_pattern!(
    RE_DATE_YEAR,
    r"(?i)\b\d{4}\s*[-–]\s*(?:\d{4}|present|current)\b"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingCase {
    AllCaps,
    TitleCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactLayout {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePattern {
    /// `MM/YYYY - MM/YYYY`
    MonthSlashYear,
    /// `Mon YYYY - Mon YYYY`
    MonthNameYear,
    /// `YYYY - YYYY`
    YearRange,
    /// `MM.YYYY - MM.YYYY`
    MonthDotYear,
}

impl DatePattern {
    pub fn label(&self) -> &'static str {
        match self {
            DatePattern::MonthSlashYear => "MM/YYYY - MM/YYYY",
            DatePattern::MonthNameYear => "Mon YYYY - Mon YYYY",
            DatePattern::YearRange => "YYYY - YYYY",
            DatePattern::MonthDotYear => "MM.YYYY - MM.YYYY",
        }
    }
}

impl fmt::Display for HeadingCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingCase::AllCaps => write!(f, "ALL CAPS"),
            HeadingCase::TitleCase => write!(f, "Title Case"),
        }
    }
}

impl fmt::Display for ContactLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactLayout::Horizontal => write!(f, "horizontal (fields on one line)"),
            ContactLayout::Vertical => write!(f, "vertical (one field per line)"),
        }
    }
}

/// Formatting conventions the generator should reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDescriptor {
    pub bullet_glyph: char,
    pub heading_case: HeadingCase,
    pub contact_layout: ContactLayout,
    pub date_pattern: DatePattern,
}

impl Default for StyleDescriptor {
    fn default() -> Self {
        Self {
            bullet_glyph: DEFAULT_GLYPH,
            heading_case: HeadingCase::AllCaps,
            contact_layout: ContactLayout::Horizontal,
            date_pattern: DatePattern::MonthSlashYear,
        }
    }
}

impl StyleDescriptor {
    /// Short, prompt-ready summary.
    pub fn describe(&self) -> String {
        format!(
            "Bullets: {}\nHeadings: {}\nContact: {}\nDates: {}",
            self.bullet_glyph,
            self.heading_case,
            self.contact_layout,
            self.date_pattern.label()
        )
    }
}

/// Derives a StyleDescriptor from a sample CV.
pub fn extract(sample_text: &str) -> StyleDescriptor {
    let lines: Vec<&str> = sample_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let descriptor = StyleDescriptor {
        bullet_glyph: detect_bullet_glyph(&lines),
        heading_case: detect_heading_case(&lines),
        contact_layout: detect_contact_layout(&lines),
        date_pattern: detect_date_pattern(&lines),
    };
    debug!("Extracted style from {} lines: {:?}", lines.len(), descriptor);
    descriptor
}

/// Glyph leading `line`, if any. `-` and `*` only count when followed by whitespace.
fn leading_glyph(line: &str) -> Option<char> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if !BULLET_GLYPHS.contains(&first) {
        return None;
    }
    if matches!(first, '-' | '*') && !chars.next().is_some_and(char::is_whitespace) {
        return None;
    }
    Some(first)
}

/// Most frequent item; ties go to whichever appeared first.
fn majority<T: Copy + PartialEq>(items: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some(entry) => entry.1 += 1,
            None => counts.push((item, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (item, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

fn detect_bullet_glyph(lines: &[&str]) -> char {
    majority(lines.iter().filter_map(|l| leading_glyph(l))).unwrap_or(DEFAULT_GLYPH)
}

fn detect_heading_case(lines: &[&str]) -> HeadingCase {
    majority(lines.iter().filter_map(|l| classify_heading(l))).unwrap_or(HeadingCase::AllCaps)
}

/// Case of a heading-like line, `None` for anything that does not look like a heading.
fn classify_heading(line: &str) -> Option<HeadingCase> {
    let line = line.strip_suffix(':').unwrap_or(line).trim_end();
    let words: Vec<&str> = line.split_whitespace().collect();

    if line.chars().count() > MAX_HEADING_CHARS
        || words.is_empty()
        || words.len() > MAX_HEADING_WORDS
        || leading_glyph(line).is_some()
        || line.ends_with(['.', ',', ';', '!', '?'])
        || line.chars().any(|c| c.is_ascii_digit() || c == '@')
    {
        return None;
    }

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        return Some(HeadingCase::AllCaps);
    }

    let title = words.iter().enumerate().all(|(i, word)| {
        if i > 0 && LOWERCASE_CONNECTORS.contains(&word.to_lowercase().as_str()) {
            return true;
        }
        match word.chars().find(|c| c.is_alphabetic()) {
            Some(c) => c.is_uppercase(),
            None => true,
        }
    });
    if title && !letters.is_empty() {
        Some(HeadingCase::TitleCase)
    } else {
        None
    }
}

fn is_match(pattern: &LazyLock<Option<Regex>>, line: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(line))
}

/// Horizontal when one line carries two or more contact fields, vertical when they are
/// spread over separate lines. No contact fields at all keeps the default layout.
fn detect_contact_layout(lines: &[&str]) -> ContactLayout {
    let per_line: Vec<usize> = lines
        .iter()
        .map(|line| {
            [&RE_EMAIL, &RE_PHONE, &RE_LOCATION]
                .into_iter()
                .filter(|re| is_match(re, line))
                .count()
        })
        .collect();

    if per_line.iter().any(|&fields| fields >= 2) {
        ContactLayout::Horizontal
    } else if per_line.iter().filter(|&&fields| fields == 1).count() >= 2 {
        ContactLayout::Vertical
    } else {
        StyleDescriptor::default().contact_layout
    }
}

fn detect_date_pattern(lines: &[&str]) -> DatePattern {
    let patterns = [
        (&RE_DATE_SLASH, DatePattern::MonthSlashYear),
        (&RE_DATE_DOT, DatePattern::MonthDotYear),
        (&RE_DATE_MONTH, DatePattern::MonthNameYear),
        (&RE_DATE_YEAR, DatePattern::YearRange),
    ];
    lines
        .iter()
        .find_map(|line| {
            patterns
                .iter()
                .find(|(re, _)| is_match(re, line))
                .map(|(_, pattern)| *pattern)
        })
        .unwrap_or(DatePattern::MonthSlashYear)
}
