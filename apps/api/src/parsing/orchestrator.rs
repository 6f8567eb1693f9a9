use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::extraction::{extract_text, ExtractError, ExtractedText, MediaType};
use crate::models::{DegradedReason, StructuredResume};
use crate::parsing::ai::{AiError, AiExtractor};
use crate::parsing::heuristic::recover_structured;
use crate::parsing::tables::CompiledTables;

/// Normalized text plus the structured record derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub extracted_text: ExtractedText,
    pub resume: StructuredResume,
}

/// Steps of the AI -> heuristic fallback chain.
enum FallbackState<'a> {
    NoCapability,
    AttemptAi(&'a AiExtractor),
    Heuristic { reason: Option<DegradedReason> },
}

/// Resume parsing entry point. Immutable after construction and shared across requests.
pub struct ResumeParser {
    ai: Option<AiExtractor>,
    tables: Arc<CompiledTables>,
    ai_timeout: Duration,
}

impl ResumeParser {
    pub fn new(ai: Option<AiExtractor>, tables: CompiledTables, ai_timeout: Duration) -> Self {
        Self {
            ai,
            tables: Arc::new(tables),
            ai_timeout,
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.is_some()
    }

    /// Extracts text and structures it. Only extraction errors surface; AI
    /// failures degrade to the heuristic record.
    pub async fn parse_resume(
        &self,
        bytes: Bytes,
        media_type: MediaType,
        fallback_email: &str,
    ) -> Result<ParseOutcome, ExtractError> {
        let extracted_text = tokio::task::spawn_blocking(move || extract_text(&bytes, media_type))
            .await
            .map_err(|e| ExtractError::MalformedDocument(format!("extraction task failed: {e}")))??;

        let resume = self.structure_text(&extracted_text, fallback_email).await;
        Ok(ParseOutcome {
            extracted_text,
            resume,
        })
    }

    pub async fn structure_text(
        &self,
        text: &ExtractedText,
        fallback_email: &str,
    ) -> StructuredResume {
        let mut state = match &self.ai {
            Some(ai) => FallbackState::AttemptAi(ai),
            None => FallbackState::NoCapability,
        };

        loop {
            state = match state {
                FallbackState::NoCapability => {
                    info!("AI extraction not configured, using heuristic parser");
                    FallbackState::Heuristic { reason: None }
                }
                FallbackState::AttemptAi(ai) => match self.attempt_ai(ai, text).await {
                    Ok(mut resume) => {
                        if resume.email.is_empty() {
                            resume.email = fallback_email.to_string();
                        }
                        info!(backend = ai.backend_name(), "Resume structured by AI");
                        return resume;
                    }
                    Err(err) => {
                        let reason = err.degraded_reason();
                        warn!(error = %err, ?reason, "AI extraction failed, falling back to heuristic parser");
                        FallbackState::Heuristic {
                            reason: Some(reason),
                        }
                    }
                },
                FallbackState::Heuristic { reason } => {
                    let resume = recover_structured(text, fallback_email, &self.tables);
                    info!(
                        skills = resume.skills.len(),
                        experience = resume.experience.len(),
                        education = resume.education.len(),
                        degraded = reason.is_some(),
                        "Resume structured by heuristic parser"
                    );
                    return match reason {
                        Some(reason) => resume.into_degraded(reason),
                        None => resume,
                    };
                }
            };
        }
    }

    async fn attempt_ai(
        &self,
        ai: &AiExtractor,
        text: &ExtractedText,
    ) -> Result<StructuredResume, AiError> {
        timeout(self.ai_timeout, ai.extract(text))
            .await
            .unwrap_or(Err(AiError::Timeout))
    }
}
