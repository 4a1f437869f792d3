// Shared prompt fragments used by more than one task prompt.
// Task-specific prompts live in generation/prompts.rs.

/// Instruction that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Anti-fabrication rule appended to every generation prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Use ONLY facts stated in the retrieved context. \
    Do NOT invent employers, percentages, dollar amounts or metrics that the context does not state. \
    If no metric is available, describe scope qualitatively instead.";
