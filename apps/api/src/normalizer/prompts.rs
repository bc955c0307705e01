// AI Normalizer prompt templates.
// Every template names the exact JSON shape the normalizer will default-fill.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const RESUME_PARSE_SYSTEM: &str = "\
You are a precise resume data extractor. \
You MUST respond with valid JSON only; no markdown fences, no explanations.";

/// Replace `{input}` before sending.
pub const RESUME_PARSE_PROMPT: &str = r#"Extract the candidate's details from the resume text below.

RESUME TEXT:
{input}

Return exactly this JSON structure:
{
  "emails": ["string"],
  "phones": ["string"],
  "objective": "string",
  "skills": ["string"],
  "education": [
    {"school": "string", "degree": "string", "datesAttended": "string", "gpa": "string"}
  ],
  "jobHistory": [
    {
      "company": "string",
      "title": "string",
      "description": "string",
      "startDate": "string",
      "endDate": "string",
      "responsibilities": ["string"],
      "accomplishments": ["string"]
    }
  ]
}

RULES:
1. Keep skills in the order they appear.
2. Keep jobs and schools in the order they appear.
3. Copy GPAs exactly as written (e.g. "3.50/4.00").
{no_invention}"#;

pub const JOB_AD_SYSTEM: &str = "\
You are an expert job description analyst. \
You MUST respond with valid JSON only; no markdown fences, no explanations.";

pub const JOB_AD_PROMPT: &str = r#"Extract the structured fields of this job advertisement.

JOB AD TEXT:
{input}

Return exactly this JSON structure:
{
  "jobTitle": "string",
  "companyName": "string",
  "description": "string",
  "requirements": ["string"],
  "postedAt": "string",
  "location": "string"
}

"description" is a two to four sentence summary of the role.
"requirements" lists each stated requirement as its own string.
{no_invention}"#;

pub const TITLE_COMPANY_SYSTEM: &str = JSON_ONLY_SYSTEM;

pub const TITLE_COMPANY_PROMPT: &str = r#"Identify the job title and the hiring company in this text.

TEXT:
{input}

Return exactly: {"title": "string", "company": "string"}
{no_invention}"#;

pub const TAILOR_SYSTEM: &str = "\
You are an expert resume writer. You tailor an existing candidate profile to a job ad \
without inventing experience.";

pub const TAILOR_JSON_PROMPT: &str = r#"Rewrite the candidate profile so it targets the job ad.

CANDIDATE PROFILE AND JOB AD (JSON, keys "profile" and "jobAd"):
{input}

Return exactly this JSON structure:
{
  "contactInfo": {"email": "string", "phone": "string", "additionalEmails": ["string"], "additionalPhones": ["string"]},
  "careerObjective": "string",
  "skills": ["string"],
  "jobHistory": [
    {"company": "string", "title": "string", "description": "string", "startDate": "string", "endDate": "string", "responsibilities": ["string"], "accomplishments": ["string"]}
  ],
  "education": [
    {"school": "string", "degree": "string", "datesAttended": "string", "gpa": "string"}
  ]
}

RULES:
1. Order skills by relevance to the job ad.
2. Rephrase responsibilities and accomplishments using the job ad's vocabulary where truthful.
3. Never add employers, schools, dates, or skills that are not in the profile.
4. Respond with the JSON object only."#;

pub const TAILOR_TEXT_PROMPT: &str = r#"Write a complete plain-text resume for the candidate, tailored to the job ad.

CANDIDATE PROFILE AND JOB AD (JSON, keys "profile" and "jobAd"):
{input}

Use clear section headings (Objective, Skills, Experience, Education).
Never add employers, schools, dates, or skills that are not in the profile.
Respond with the resume text only."#;

pub const CHAT_SYSTEM: &str = "\
You are a friendly career assistant inside a resume builder. \
You MUST respond with valid JSON only; no markdown fences, no explanations.";

pub const CHAT_PROMPT: &str = r#"Answer the user's message. Use the profile for context when it is provided.

CONVERSATION INPUT (JSON, keys "message" and "profile"; profile may be null):
{input}

Return exactly: {"reply": "string", "suggestions": ["string"]}"#;
