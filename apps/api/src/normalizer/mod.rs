//! AI Normalizer: turns free text into strictly shaped JSON via the LLM client.
//!
//! Every task makes at most one outbound completion call. The untrusted response
//! goes through [`recovery::recover_json`]; failure is `MalformedAiResponse` with
//! the raw text attached, never an empty object. Successful results have every
//! key of the task schema present.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::NO_INVENTION_INSTRUCTION;
use crate::llm_client::{LlmClient, Usage};
use crate::models::job_ad::{JobAd, JobAdFields, TitleAndCompany};
use crate::models::profile::ProfileData;
use crate::models::resume::{GenerationMetadata, ResumeFormat};

pub mod gpa;
pub mod prompts;
pub mod recovery;

use prompts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    ParseResumeText,
    ExtractJobAdFields,
    GenerateTailoredResume,
    ExtractTitleAndCompany,
    ChatAssist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
    Object,
}

/// One required top-level key of a task's output.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, kind }
}

const RESUME_SCHEMA: &[FieldSpec] = &[
    field("emails", FieldKind::List),
    field("phones", FieldKind::List),
    field("objective", FieldKind::Text),
    field("skills", FieldKind::List),
    field("education", FieldKind::List),
    field("jobHistory", FieldKind::List),
];

const JOB_AD_SCHEMA: &[FieldSpec] = &[
    field("jobTitle", FieldKind::Text),
    field("companyName", FieldKind::Text),
    field("description", FieldKind::Text),
    field("requirements", FieldKind::List),
    field("postedAt", FieldKind::Text),
    field("location", FieldKind::Text),
];

const TAILORED_SCHEMA: &[FieldSpec] = &[
    field("contactInfo", FieldKind::Object),
    field("careerObjective", FieldKind::Text),
    field("skills", FieldKind::List),
    field("jobHistory", FieldKind::List),
    field("education", FieldKind::List),
];

const TITLE_COMPANY_SCHEMA: &[FieldSpec] = &[
    field("title", FieldKind::Text),
    field("company", FieldKind::Text),
];

const CHAT_SCHEMA: &[FieldSpec] = &[
    field("reply", FieldKind::Text),
    field("suggestions", FieldKind::List),
];

impl TaskKind {
    /// The JSON shape this task must produce.
    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            TaskKind::ParseResumeText => RESUME_SCHEMA,
            TaskKind::ExtractJobAdFields => JOB_AD_SCHEMA,
            TaskKind::GenerateTailoredResume => TAILORED_SCHEMA,
            TaskKind::ExtractTitleAndCompany => TITLE_COMPANY_SCHEMA,
            TaskKind::ChatAssist => CHAT_SCHEMA,
        }
    }

    fn system(self) -> &'static str {
        match self {
            TaskKind::ParseResumeText => RESUME_PARSE_SYSTEM,
            TaskKind::ExtractJobAdFields => JOB_AD_SYSTEM,
            TaskKind::GenerateTailoredResume => TAILOR_SYSTEM,
            TaskKind::ExtractTitleAndCompany => TITLE_COMPANY_SYSTEM,
            TaskKind::ChatAssist => CHAT_SYSTEM,
        }
    }

    fn template(self) -> &'static str {
        match self {
            TaskKind::ParseResumeText => RESUME_PARSE_PROMPT,
            TaskKind::ExtractJobAdFields => JOB_AD_PROMPT,
            TaskKind::GenerateTailoredResume => TAILOR_JSON_PROMPT,
            TaskKind::ExtractTitleAndCompany => TITLE_COMPANY_PROMPT,
            TaskKind::ChatAssist => CHAT_PROMPT,
        }
    }
}

fn render(template: &str, input: &str) -> String {
    template
        .replace("{no_invention}", NO_INVENTION_INSTRUCTION)
        .replace("{input}", input)
}

/// Ensures every schema key is present with a value of the expected kind.
/// Missing or null keys get `""`, `[]` or `{}`; a lone string where a list is
/// expected becomes a one-element list; a list where text is expected is joined.
pub fn fill_defaults(map: &mut Map<String, Value>, schema: &[FieldSpec]) {
    for spec in schema {
        let current = map.remove(spec.key).unwrap_or(Value::Null);
        let value = match (spec.kind, current) {
            (FieldKind::Text, Value::Null) => Value::String(String::new()),
            (FieldKind::Text, Value::Number(n)) => Value::String(n.to_string()),
            (FieldKind::Text, Value::Array(items)) => Value::String(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            (FieldKind::List, Value::Null) => Value::Array(Vec::new()),
            (FieldKind::List, Value::String(s)) if s.trim().is_empty() => Value::Array(Vec::new()),
            (FieldKind::List, Value::String(s)) => Value::Array(vec![Value::String(s)]),
            (FieldKind::Object, Value::Null) => Value::Object(Map::new()),
            (_, other) => other,
        };
        map.insert(spec.key.to_string(), value);
    }
}

/// A task result with its provenance.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub value: Map<String, Value>,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatReply {
    pub reply: String,
    pub suggestions: Vec<String>,
}

static TITLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:job[ \t]+)?title[ \t]*:[ \t]*(\S.*?)[ \t]*$").expect("static regex")
});

static COMPANY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*company(?:[ \t]+name)?[ \t]*:[ \t]*(\S.*?)[ \t]*$")
        .expect("static regex")
});

/// Literal `Title: X` / `Company: Y` lines, when the text has them.
pub fn literal_title_and_company(text: &str) -> (Option<String>, Option<String>) {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    (capture(&TITLE_LINE), capture(&COMPANY_LINE))
}

#[derive(Clone)]
pub struct Normalizer {
    llm: LlmClient,
}

impl Normalizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Runs one task over `input` and returns the recovered, default-filled object.
    pub async fn normalize(&self, task: TaskKind, input: &str) -> Result<Normalized, AppError> {
        let prompt = render(task.template(), input);
        let response = self.llm.call(&prompt, task.system()).await?;

        let mut value = match recovery::recover_json(&response.text) {
            Some(Value::Object(map)) => map,
            _ => {
                warn!("{task:?}: model output was not a JSON object");
                return Err(AppError::MalformedAiResponse {
                    raw: response.text,
                });
            }
        };
        fill_defaults(&mut value, task.schema());

        if task == TaskKind::ParseResumeText {
            if let Some(Value::Array(education)) = value.get_mut("education") {
                gpa::backfill_gpas(education, input);
            }
        }

        Ok(Normalized {
            value,
            model: response.model,
            usage: response.usage,
        })
    }

    pub async fn parse_resume_text(&self, text: &str) -> Result<Normalized, AppError> {
        self.normalize(TaskKind::ParseResumeText, text).await
    }

    pub async fn extract_job_ad_fields(&self, text: &str) -> Result<JobAdFields, AppError> {
        let normalized = self.normalize(TaskKind::ExtractJobAdFields, text).await?;
        decode(normalized.value)
    }

    /// Uses literal `Title:`/`Company:` lines when both exist; only otherwise
    /// asks the model, still preferring whichever literal value was found.
    pub async fn extract_title_and_company(&self, text: &str) -> Result<TitleAndCompany, AppError> {
        let (title, company) = literal_title_and_company(text);
        if let (Some(title), Some(company)) = (&title, &company) {
            return Ok(TitleAndCompany {
                title: title.clone(),
                company: company.clone(),
            });
        }

        let normalized = self.normalize(TaskKind::ExtractTitleAndCompany, text).await?;
        let from_model: TitleAndCompany = decode(normalized.value)?;
        Ok(TitleAndCompany {
            title: title.unwrap_or(from_model.title),
            company: company.unwrap_or(from_model.company),
        })
    }

    pub async fn generate_tailored_resume(
        &self,
        profile: &ProfileData,
        job_ad: &JobAd,
        format: ResumeFormat,
    ) -> Result<(Value, GenerationMetadata), AppError> {
        let context = json!({ "profile": profile, "jobAd": job_ad.fields }).to_string();

        let (content, model, usage) = match format {
            ResumeFormat::Json => {
                let normalized = self
                    .normalize(TaskKind::GenerateTailoredResume, &context)
                    .await?;
                let data: ProfileData = decode(normalized.value)?;
                let content = serde_json::to_value(data)
                    .map_err(|e| AppError::Internal(e.into()))?;
                (content, normalized.model, normalized.usage)
            }
            ResumeFormat::Text => {
                let prompt = render(TAILOR_TEXT_PROMPT, &context);
                let response = self.llm.call(&prompt, TAILOR_SYSTEM).await?;
                let text = recovery::strip_code_fences(&response.text).to_string();
                (Value::String(text), response.model, response.usage)
            }
        };

        info!(
            "Generated {} resume with {} ({} in / {} out tokens)",
            format.as_str(),
            model,
            usage.input_tokens,
            usage.output_tokens
        );

        Ok((
            content,
            GenerationMetadata {
                model,
                usage,
                generated_at: Utc::now(),
            },
        ))
    }

    pub async fn chat_assist(
        &self,
        message: &str,
        profile: Option<&ProfileData>,
    ) -> Result<ChatReply, AppError> {
        let context = json!({ "message": message, "profile": profile }).to_string();
        let normalized = self.normalize(TaskKind::ChatAssist, &context).await?;
        decode(normalized.value)
    }
}

/// Deserializes a default-filled object. A shape mismatch inside a present key
/// (e.g. an object where a list of strings belongs) is a malformed response.
fn decode<T: serde::de::DeserializeOwned>(value: Map<String, Value>) -> Result<T, AppError> {
    let value = Value::Object(value);
    serde_json::from_value(value.clone()).map_err(|e| {
        warn!("Recovered JSON does not match the expected shape: {e}");
        AppError::MalformedAiResponse {
            raw: value.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stub_normalizer;
    use uuid::Uuid;

    #[test]
    fn test_fill_defaults_adds_missing_keys() {
        let mut map = Map::new();
        map.insert("skills".into(), json!(["Go"]));
        fill_defaults(&mut map, RESUME_SCHEMA);
        assert_eq!(
            Value::Object(map),
            json!({
                "emails": [], "phones": [], "objective": "",
                "skills": ["Go"], "education": [], "jobHistory": []
            })
        );
    }

    #[test]
    fn test_fill_defaults_coerces_scalars() {
        let mut map = Map::new();
        map.insert("requirements".into(), json!("5 years Rust"));
        map.insert("postedAt".into(), json!(null));
        map.insert("location".into(), json!(["Remote", "Berlin"]));
        fill_defaults(&mut map, JOB_AD_SCHEMA);
        assert_eq!(map["requirements"], json!(["5 years Rust"]));
        assert_eq!(map["postedAt"], json!(""));
        assert_eq!(map["location"], json!("Remote, Berlin"));
        assert_eq!(map["jobTitle"], json!(""));
    }

    #[test]
    fn test_every_task_has_a_schema_and_prompt() {
        for task in [
            TaskKind::ParseResumeText,
            TaskKind::ExtractJobAdFields,
            TaskKind::GenerateTailoredResume,
            TaskKind::ExtractTitleAndCompany,
            TaskKind::ChatAssist,
        ] {
            assert!(!task.schema().is_empty());
            let rendered = render(task.template(), "INPUT-MARKER");
            assert!(rendered.contains("INPUT-MARKER"));
            assert!(!rendered.contains("{no_invention}"));
            for spec in task.schema() {
                assert!(rendered.contains(spec.key), "{task:?} prompt lacks {}", spec.key);
            }
        }
    }

    #[test]
    fn test_literal_title_and_company() {
        let text = "Job Title: Senior Rust Engineer  \nCompany Name: Acme Corp\nWe build things.";
        assert_eq!(
            literal_title_and_company(text),
            (
                Some("Senior Rust Engineer".to_string()),
                Some("Acme Corp".to_string())
            )
        );
        assert_eq!(literal_title_and_company("Just prose."), (None, None));
    }

    #[tokio::test]
    async fn test_parse_resume_end_to_end() {
        let (normalizer, stub) = stub_normalizer(vec![Ok(
            "```json\n{\"emails\":[\"john@x.com\"],\"skills\":[\"Go\",\"SQL\"]}\n```".to_string(),
        )]);
        let result = normalizer
            .parse_resume_text("John Doe\njohn@x.com\nSkills: Go, SQL")
            .await
            .unwrap();
        assert_eq!(
            Value::Object(result.value),
            json!({
                "emails": ["john@x.com"], "phones": [], "objective": "",
                "skills": ["Go", "SQL"], "education": [], "jobHistory": []
            })
        );
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_parse_resume_backfills_gpa_from_input() {
        let (normalizer, _) = stub_normalizer(vec![Ok(
            r#"{"education": [{"school": "State U", "degree": "BSc"}]}"#.to_string(),
        )]);
        let result = normalizer
            .parse_resume_text("State U, BSc, GPA: 3.7")
            .await
            .unwrap();
        assert_eq!(result.value["education"][0]["gpa"], "3.7");
    }

    #[tokio::test]
    async fn test_non_json_response_is_malformed_with_raw_text() {
        let (normalizer, _) =
            stub_normalizer(vec![Ok("Sorry, I can't read that resume.".to_string())]);
        let err = normalizer.parse_resume_text("text").await.unwrap_err();
        match err {
            AppError::MalformedAiResponse { raw } => {
                assert_eq!(raw, "Sorry, I can't read that resume.")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_array_response_is_malformed() {
        let (normalizer, _) = stub_normalizer(vec![Ok("[1, 2, 3]".to_string())]);
        assert!(matches!(
            normalizer.parse_resume_text("text").await,
            Err(AppError::MalformedAiResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_title_and_company_skips_model_when_literal() {
        let (normalizer, stub) = stub_normalizer(vec![]);
        let result = normalizer
            .extract_title_and_company("Title: Data Engineer\nCompany: Initech")
            .await
            .unwrap();
        assert_eq!(result.title, "Data Engineer");
        assert_eq!(result.company, "Initech");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_title_and_company_prefers_literal_half() {
        let (normalizer, stub) = stub_normalizer(vec![Ok(
            r#"{"title": "Model Title", "company": "Globex"}"#.to_string(),
        )]);
        let result = normalizer
            .extract_title_and_company("Title: Data Engineer\nJoin our growing team at Globex.")
            .await
            .unwrap();
        assert_eq!(result.title, "Data Engineer");
        assert_eq!(result.company, "Globex");
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_job_ad_fields_are_complete() {
        let (normalizer, _) = stub_normalizer(vec![Ok(
            "Here you go: {\"jobTitle\": \"SRE\", \"requirements\": [\"Linux\"]}".to_string(),
        )]);
        let fields = normalizer.extract_job_ad_fields("ad text").await.unwrap();
        assert_eq!(fields.job_title, "SRE");
        assert_eq!(fields.requirements, vec!["Linux"]);
        assert_eq!(fields.company_name, "");
    }

    #[tokio::test]
    async fn test_wrong_nested_shape_is_malformed() {
        let (normalizer, _) = stub_normalizer(vec![Ok(
            r#"{"jobTitle": {"nested": true}}"#.to_string(),
        )]);
        assert!(matches!(
            normalizer.extract_job_ad_fields("ad").await,
            Err(AppError::MalformedAiResponse { .. })
        ));
    }

    fn sample_job_ad() -> JobAd {
        JobAd {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            raw_text: "ad".into(),
            source_url: None,
            fields: JobAdFields {
                job_title: "SRE".into(),
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_generate_json_resume_is_profile_shaped() {
        let (normalizer, _) = stub_normalizer(vec![Ok(
            r#"```json
{"careerObjective": "Keep systems up", "skills": ["Linux", "Go"]}
```"#
                .to_string(),
        )]);
        let (content, meta) = normalizer
            .generate_tailored_resume(&ProfileData::default(), &sample_job_ad(), ResumeFormat::Json)
            .await
            .unwrap();
        assert_eq!(content["careerObjective"], "Keep systems up");
        assert_eq!(content["skills"], json!(["Linux", "Go"]));
        assert_eq!(content["contactInfo"]["email"], "");
        assert_eq!(content["jobHistory"], json!([]));
        assert_eq!(meta.model, "stub-model");
    }

    #[tokio::test]
    async fn test_generate_text_resume_strips_fences() {
        let (normalizer, _) =
            stub_normalizer(vec![Ok("```\nJANE ROE\nSkills: Go\n```".to_string())]);
        let (content, _) = normalizer
            .generate_tailored_resume(&ProfileData::default(), &sample_job_ad(), ResumeFormat::Text)
            .await
            .unwrap();
        assert_eq!(content, json!("JANE ROE\nSkills: Go"));
    }

    #[tokio::test]
    async fn test_chat_reply_defaults_suggestions() {
        let (normalizer, _) = stub_normalizer(vec![Ok(r#"{"reply": "Add metrics."}"#.to_string())]);
        let reply = normalizer.chat_assist("How do I improve?", None).await.unwrap();
        assert_eq!(reply.reply, "Add metrics.");
        assert!(reply.suggestions.is_empty());
    }
}
