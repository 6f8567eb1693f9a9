//! DOCX raw-text extraction.
//!
//! Reads `word/document.xml` from the package and keeps only the run text,
//! with paragraph ends as blank lines. Styles, tables, and images are ignored.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::{ExtractError, ExtractedText};

const DOCUMENT_PART: &str = "word/document.xml";

pub fn extract_docx_text(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let xml = read_document_part(bytes)?;
    let raw = document_xml_to_text(&xml)?;

    if raw.trim().is_empty() {
        return Err(ExtractError::EmptyDocument(
            "DOCX appears to be empty".to_string(),
        ));
    }

    debug!("DOCX raw text: {} chars", raw.len());
    ExtractedText::from_flow(&raw)
}

fn read_document_part(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::MalformedDocument(format!("not a DOCX package: {e}")))?;

    let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| {
        ExtractError::MalformedDocument(format!("missing {DOCUMENT_PART}: {e}"))
    })?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| ExtractError::MalformedDocument(format!("unreadable {DOCUMENT_PART}: {e}")))?;
    Ok(xml)
}

/// Flattens WordprocessingML into plain text, one blank line per paragraph end.
fn document_xml_to_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;
    // `w:tab` also names tab-stop definitions under `w:pPr/w:tabs`; only a run's tab is text.
    let mut in_run = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ExtractError::MalformedDocument(format!(
                "invalid document XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = true,
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| {
                    ExtractError::MalformedDocument(format!("invalid text entity: {e}"))
                })?;
                out.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
