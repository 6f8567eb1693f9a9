// Text extraction: raw resume bytes of a declared media type -> normalized plain text.
// Parsing is CPU-bound; async callers must run `extract_text` inside spawn_blocking.

pub mod docx;
pub mod pdf;
pub mod to_unicode;

#[cfg(test)]
pub mod fixtures;

use std::fmt;
use std::ops::Deref;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Below this many characters the document is treated as having no selectable text.
pub const MIN_TEXT_CHARS: usize = 10;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}. Please upload a PDF or DOCX file.")]
    UnsupportedFormat(String),

    #[error("Document contains no usable text: {0}")]
    EmptyDocument(String),

    #[error("Failed to parse document: {0}")]
    MalformedDocument(String),
}

/// The two supported document families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// Page-oriented, positioned text fragments.
    Pdf,
    /// Flow document with native paragraph structure.
    Docx,
}

impl MediaType {
    /// Resolves a declared MIME type. Parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Result<Self, ExtractError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == PDF_MIME {
            Ok(MediaType::Pdf)
        } else if essence == DOCX_MIME
            || essence.contains("officedocument.wordprocessingml.document")
        {
            Ok(MediaType::Docx)
        } else {
            Err(ExtractError::UnsupportedFormat(mime.to_string()))
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaType::Pdf => "PDF",
            MediaType::Docx => "DOCX",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized document text. Only constructible through `ExtractedText::new`
/// or `ExtractedText::from_flow`, so every value is normalized and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Normalizes `raw` and checks the minimum length.
    pub fn new(raw: &str) -> Result<Self, ExtractError> {
        let cleaned = normalize_whitespace(raw);
        if cleaned.chars().count() < MIN_TEXT_CHARS {
            return Err(ExtractError::EmptyDocument(
                "the document appears to be empty or contains only images. \
                 Please ensure your resume has selectable text."
                    .to_string(),
            ));
        }
        Ok(Self(cleaned))
    }

    /// Normalizes text from a flow document. Paragraph structure is native
    /// there, so short text is accepted and only an empty result is rejected.
    pub fn from_flow(raw: &str) -> Result<Self, ExtractError> {
        let cleaned = normalize_whitespace(raw);
        if cleaned.is_empty() {
            return Err(ExtractError::EmptyDocument(
                "the document has no text content".to_string(),
            ));
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ExtractedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ExtractedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static WS_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n ?").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapses horizontal whitespace, caps blank lines at one and trims.
pub fn normalize_whitespace(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");
    let tight = WS_AROUND_NEWLINE.replace_all(&collapsed, "\n");
    EXCESS_NEWLINES
        .replace_all(&tight, "\n\n")
        .trim()
        .to_string()
}

/// Converts raw document bytes of a known format into normalized text.
pub fn extract_text(bytes: &[u8], media_type: MediaType) -> Result<ExtractedText, ExtractError> {
    info!(
        "Extracting text: type={}, size={} bytes",
        media_type,
        bytes.len()
    );

    let text = match media_type {
        MediaType::Pdf => pdf::extract_pdf_text(bytes)?,
        MediaType::Docx => docx::extract_docx_text(bytes)?,
    };

    info!("Extracted {} chars from {}", text.len(), media_type);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime_pdf() {
        assert_eq!(MediaType::from_mime("application/pdf").unwrap(), MediaType::Pdf);
        assert_eq!(
            MediaType::from_mime("Application/PDF; charset=binary").unwrap(),
            MediaType::Pdf
        );
    }

    #[test]
    fn test_media_type_from_mime_docx_variants() {
        assert_eq!(MediaType::from_mime(DOCX_MIME).unwrap(), MediaType::Docx);
        assert_eq!(
            MediaType::from_mime("x-application/officedocument.wordprocessingml.document")
                .unwrap(),
            MediaType::Docx
        );
    }

    #[test]
    fn test_media_type_rejects_unknown() {
        let err = MediaType::from_mime("image/png").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref m) if m == "image/png"));
    }

    #[test]
    fn test_normalize_collapses_horizontal_whitespace() {
        assert_eq!(normalize_whitespace("Jane \t  Doe"), "Jane Doe");
    }

    #[test]
    fn test_normalize_caps_blank_lines() {
        let out = normalize_whitespace("a\n\n\n\n\nb\n \n \nc");
        assert_eq!(out, "a\n\nb\n\nc");
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn test_normalize_trims_and_unifies_line_endings() {
        assert_eq!(normalize_whitespace("  \r\nline one\r\nline two  \n"), "line one\nline two");
    }

    #[test]
    fn test_extracted_text_rejects_short_content() {
        let err = ExtractedText::new("  tiny \n\n").unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument(_)));
    }

    #[test]
    fn test_extracted_text_accepts_threshold_length() {
        let text = ExtractedText::new("0123456789").unwrap();
        assert_eq!(text.as_str(), "0123456789");
    }

    #[test]
    fn test_flow_text_accepts_short_content() {
        let text = ExtractedText::from_flow("  Jane \t Doe \n\n\n").unwrap();
        assert_eq!(text.as_str(), "Jane Doe");
    }

    #[test]
    fn test_flow_text_rejects_whitespace_only() {
        let err = ExtractedText::from_flow(" \n\t\n ").unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument(_)));
    }
}
