// Shared prompt constants.
// Task-specific prompts live in normalizer/prompts.rs.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every extraction prompt so the model leaves gaps empty.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    Only use information present in the input. \
    If a field is not present, use an empty string or an empty array. \
    Never invent employers, dates, schools, or contact details.";
