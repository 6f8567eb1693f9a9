use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{ExtractedText, MediaType};
use crate::models::StructuredResume;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ParseResumeResponse {
    pub id: Uuid,
    pub file_name: String,
    pub extracted_text: ExtractedText,
    pub structured_data: StructuredResume,
    /// Mirrors `structured_data.degraded_reason` so clients can surface it directly.
    pub warning: Option<String>,
    pub parsed_at: DateTime<Utc>,
}

struct Upload {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// POST /api/v1/resumes/parse
///
/// Multipart form: `file` (required) and `fallback_email` (optional).
pub async fn handle_parse_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ParseResumeResponse>, AppError> {
    let mut upload: Option<Upload> = None;
    let mut fallback_email = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("fallback_email") => {
                fallback_email = field.text().await.map_err(multipart_error)?.trim().to_string();
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    if upload.data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let media_type = MediaType::from_mime(&upload.content_type)?;
    info!(
        "Parsing resume: file={}, type={}, size={} bytes",
        upload.file_name,
        media_type,
        upload.data.len()
    );

    let outcome = state
        .parser
        .parse_resume(upload.data, media_type, &fallback_email)
        .await?;

    let id = Uuid::new_v4();
    info!(
        "Parsed resume {id}: provenance={:?}, degraded={}",
        outcome.resume.provenance, outcome.resume.degraded
    );

    Ok(Json(ParseResumeResponse {
        id,
        file_name: upload.file_name,
        warning: outcome.resume.degraded_reason.clone(),
        extracted_text: outcome.extracted_text,
        structured_data: outcome.resume,
        parsed_at: Utc::now(),
    }))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}
