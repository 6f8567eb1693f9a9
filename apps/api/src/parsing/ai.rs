use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::extraction::ExtractedText;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{
    mentions_quota, strip_json_fences, CompletionBackend, CompletionRequest, LlmError,
};
use crate::models::resume::{OPEN_ENDED, UNKNOWN_NAME};
use crate::models::{
    DegradedReason, EducationEntry, ExperienceEntry, Provenance, StructuredResume,
};
use crate::parsing::prompts::{RESUME_PARSE_PROMPT, RESUME_PARSE_SYSTEM, RESUME_SCHEMA};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AiError {
    #[error("AI quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("AI request failed: {0}")]
    Failed(String),

    #[error("AI returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("AI request timed out")]
    Timeout,
}

impl AiError {
    /// Quota-like failures get their own degraded message; everything else is generic.
    pub fn degraded_reason(&self) -> DegradedReason {
        match self {
            AiError::QuotaExceeded(_) => DegradedReason::QuotaExceeded,
            AiError::Failed(msg) if mentions_quota(msg) => DegradedReason::QuotaExceeded,
            _ => DegradedReason::GenericAiFailure,
        }
    }
}

impl From<LlmError> for AiError {
    fn from(err: LlmError) -> Self {
        if err.is_quota_signal() {
            AiError::QuotaExceeded(err.to_string())
        } else {
            AiError::Failed(err.to_string())
        }
    }
}

/// Single-attempt structured extraction through a `CompletionBackend`.
/// Transport retries belong to the backend; nothing is retried here.
#[derive(Clone)]
pub struct AiExtractor {
    backend: Arc<dyn CompletionBackend>,
    system: String,
}

impl AiExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            system: format!("{RESUME_PARSE_SYSTEM}\n\n{JSON_ONLY_SYSTEM}"),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn extract(&self, text: &ExtractedText) -> Result<StructuredResume, AiError> {
        let prompt = fill_template(RESUME_PARSE_PROMPT, &[("resume_text", text.as_str())]);
        let raw = self
            .backend
            .complete(CompletionRequest {
                system: &self.system,
                prompt: &prompt,
                schema_hint: RESUME_SCHEMA,
            })
            .await?;

        let resume = parse_payload(&raw)?;
        debug!(
            backend = self.backend.name(),
            experience = resume.experience.len(),
            education = resume.education.len(),
            "AI extraction succeeded"
        );
        Ok(resume)
    }
}

/// Validates raw model output against the resume schema.
pub fn parse_payload(raw: &str) -> Result<StructuredResume, AiError> {
    let body = strip_json_fences(raw);
    if body.is_empty() {
        return Err(AiError::InvalidOutput("empty response".to_string()));
    }
    let payload: ResumePayload = serde_json::from_str(body)
        .map_err(|e| AiError::InvalidOutput(format!("response does not match schema: {e}")))?;
    Ok(payload.into_resume())
}

// ────────────────────────────────────────────────────────────────────────────
// Wire payload: every scalar may be null or missing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResumePayload {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    skills: Option<Vec<Option<String>>>,
    experience: Option<Vec<ExperiencePayload>>,
    education: Option<Vec<EducationPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExperiencePayload {
    title: Option<String>,
    company: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EducationPayload {
    school: Option<String>,
    degree: Option<String>,
    field: Option<String>,
    graduation_year: Option<String>,
}

fn clean(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

impl ResumePayload {
    fn into_resume(self) -> StructuredResume {
        let name = clean(self.name);
        let phone = clean(self.phone);

        let mut skills: Vec<String> = Vec::new();
        for skill in self.skills.unwrap_or_default().into_iter().map(clean) {
            if !skill.is_empty() && !skills.iter().any(|s| s.eq_ignore_ascii_case(&skill)) {
                skills.push(skill);
            }
        }

        let experience = self
            .experience
            .unwrap_or_default()
            .into_iter()
            .map(|e| {
                let end_date = clean(e.end_date);
                ExperienceEntry {
                    title: clean(e.title),
                    company: clean(e.company),
                    start_date: clean(e.start_date),
                    end_date: if end_date.is_empty() {
                        OPEN_ENDED.to_string()
                    } else {
                        end_date
                    },
                    description: clean(e.description),
                }
            })
            .collect();

        let education = self
            .education
            .unwrap_or_default()
            .into_iter()
            .map(|e| EducationEntry {
                school: clean(e.school),
                degree: clean(e.degree),
                field: clean(e.field),
                graduation_year: clean(e.graduation_year),
            })
            .collect();

        StructuredResume {
            name: if name.is_empty() {
                UNKNOWN_NAME.to_string()
            } else {
                name
            },
            email: clean(self.email),
            phone: (!phone.is_empty()).then_some(phone),
            skills,
            experience,
            education,
            provenance: Provenance::Ai,
            degraded: false,
            degraded_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::mock::{MockBackend, MockReply};

    const FULL_PAYLOAD: &str = r#"{
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+1 555 123 4567",
        "skills": ["Rust", "rust", " Go ", ""],
        "experience": [
            {"company": "Acme", "title": "Engineer", "start_date": "2020", "end_date": null, "description": "Built things"}
        ],
        "education": [
            {"school": "MIT", "degree": "B.S.", "field": "Physics", "graduation_year": "2019"}
        ]
    }"#;

    fn extractor(backend: MockBackend) -> (AiExtractor, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        (AiExtractor::new(backend.clone()), backend)
    }

    fn sample_text() -> ExtractedText {
        ExtractedText::new("Jane Doe\nEngineer at Acme").unwrap()
    }

    #[test]
    fn test_parse_payload_normalizes_fields() {
        let r = parse_payload(FULL_PAYLOAD).unwrap();
        assert_eq!(r.name, "Jane Doe");
        assert_eq!(r.email, "jane@example.com");
        assert_eq!(r.phone.as_deref(), Some("+1 555 123 4567"));
        assert_eq!(r.skills, vec!["Rust", "Go"]);
        assert_eq!(r.experience[0].end_date, "Present");
        assert_eq!(r.experience[0].description, "Built things");
        assert_eq!(r.education[0].school, "MIT");
        assert_eq!(r.provenance, Provenance::Ai);
        assert!(!r.degraded);
    }

    #[test]
    fn test_parse_payload_tolerates_nulls() {
        let r = parse_payload(
            r#"{"name": null, "email": null, "phone": "  ", "skills": null, "experience": null, "education": []}"#,
        )
        .unwrap();
        assert_eq!(r.name, "Unknown");
        assert_eq!(r.email, "");
        assert!(r.phone.is_none());
        assert!(r.skills.is_empty());
        assert!(r.experience.is_empty());
    }

    #[test]
    fn test_parse_payload_strips_fences() {
        let r = parse_payload("```json\n{\"name\": \"Ada Lovelace\"}\n```").unwrap();
        assert_eq!(r.name, "Ada Lovelace");
    }

    #[test]
    fn test_parse_payload_rejects_bad_output() {
        for raw in ["", "```json\n```", "Sorry, I cannot help with that.", "[1, 2, 3]", r#"{"skills": "Rust"}"#] {
            assert!(
                matches!(parse_payload(raw), Err(AiError::InvalidOutput(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_extract_sends_text_and_returns_record() {
        let (ai, backend) = extractor(MockBackend::text(FULL_PAYLOAD));
        let r = ai.extract(&sample_text()).await.unwrap();
        assert_eq!(r.name, "Jane Doe");
        assert_eq!(backend.calls(), 1);
        assert!(backend.last_prompt().unwrap().contains("Engineer at Acme"));
    }

    #[tokio::test]
    async fn test_extract_classifies_backend_errors() {
        let (ai, _) = extractor(MockBackend::new(MockReply::RateLimited));
        let err = ai.extract(&sample_text()).await.unwrap_err();
        assert!(matches!(err, AiError::QuotaExceeded(_)));
        assert_eq!(err.degraded_reason(), DegradedReason::QuotaExceeded);

        let (ai, _) = extractor(MockBackend::api_error(400, "Resource has been exhausted"));
        let err = ai.extract(&sample_text()).await.unwrap_err();
        assert_eq!(err.degraded_reason(), DegradedReason::QuotaExceeded);

        let (ai, _) = extractor(MockBackend::api_error(500, "overloaded"));
        let err = ai.extract(&sample_text()).await.unwrap_err();
        assert!(matches!(err, AiError::Failed(_)));
        assert_eq!(err.degraded_reason(), DegradedReason::GenericAiFailure);

        let (ai, _) = extractor(MockBackend::new(MockReply::Empty));
        let err = ai.extract(&sample_text()).await.unwrap_err();
        assert_eq!(err.degraded_reason(), DegradedReason::GenericAiFailure);
    }

    #[test]
    fn test_timeout_and_invalid_output_are_generic() {
        assert_eq!(AiError::Timeout.degraded_reason(), DegradedReason::GenericAiFailure);
        assert_eq!(
            AiError::InvalidOutput("x".into()).degraded_reason(),
            DegradedReason::GenericAiFailure
        );
    }
}
