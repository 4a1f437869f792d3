// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the summary package — enforces JSON-only output.
pub const CV_PACKAGE_SYSTEM: &str = "You are an expert CV writer and ATS optimizer \
    for senior technology and engineering leadership roles. \
    You write factual, grounded CV content from retrieved source material.";

/// Summary package prompt template.
/// Replace: {grounding_instruction}, {json_instruction}, {summary_max_words}, {bullet_count},
///          {heading_words}, {bullet_body_rule}, {skill_count}, {skill_max_words},
///          {style}, {context}
pub const CV_PACKAGE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

RETRIEVED CONTEXT (job description and candidate experience; source of truth):
{context}

CV STYLE to follow:
{style}

Generate ONE CV content package for this candidate and role. Return a JSON object with this EXACT schema:
{
  "summary": "Executive professional summary, one paragraph",
  "bullets": [
    {"heading": "Cloud Migration", "body": "Inherited aging on-prem infrastructure; led AWS migration with team restructuring; achieved 20% cost reduction"}
  ],
  "skills": ["Distributed Systems", "Rust"]
}

HARD RULES:
1. "summary": at most {summary_max_words} words, executive tone, job description keywords used naturally
2. "bullets": EXACTLY {bullet_count} bullets in SAR (Situation-Action-Result) form, most relevant first
3. Every bullet "heading" is EXACTLY {heading_words} words taken from job description language, no abbreviations
4. {bullet_body_rule}
5. "skills": EXACTLY {skill_count} skills, each at most {skill_max_words} words, Title Case, highest priority first, no duplicates
6. No numbering, glyphs or markdown inside any field

{json_instruction}"#;

/// System prompt for cover letters — plain text output.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert career writer. \
    You write concise, specific cover letters grounded in retrieved source material. \
    Respond with the letter text only: no title, no preamble, no markdown.";

/// Cover letter prompt template.
/// Replace: {grounding_instruction}, {company_name}, {role_title}, {min_paragraphs},
///          {max_paragraphs}, {max_words}, {context}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

RETRIEVED CONTEXT (job description and candidate experience; source of truth):
{context}

Company: {company_name}
Role: {role_title}

Write a cover letter for this candidate, addressed to this company and role.

HARD RULES:
1. Between {min_paragraphs} and {max_paragraphs} paragraphs, separated by ONE blank line
2. At most {max_words} words in total
3. Open with the role and the strongest matching achievement; close with a short call to action
4. Plain prose only: no headings, bullet points, salutation block or signature block"#;

/// Stand-ins when the request names no company or role.
pub const UNNAMED_COMPANY: &str = "not given; take it from the job description, or say \"your company\"";
pub const UNNAMED_ROLE: &str = "not given; take it from the job description";

/// Used instead of the serialized context when retrieval found nothing above threshold.
pub const NO_CONTEXT_NOTE: &str = "(no retrieved context: no source passage cleared the \
    relevance threshold. Write from the task instructions alone and keep claims generic.)";

/// Corrective block appended after a failed attempt. Replace: {violations}, {previous}
pub const FEEDBACK_TEMPLATE: &str = r#"

YOUR PREVIOUS ATTEMPT FAILED VALIDATION. Fix EVERY issue listed below and keep everything else compliant:
{violations}

PREVIOUS ATTEMPT (make the minimum changes needed to fix it):
{previous}"#;

pub const BULLET_BODY_RANGE_RULE: &str = "Every bullet \"body\" is one concise sentence of \
    {min} to {max} words showing measurable impact";

pub const BULLET_BODY_FREE_RULE: &str =
    "Every bullet \"body\" is one concise sentence showing measurable impact";
