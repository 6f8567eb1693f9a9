//! PDF text extraction with positional line reconstruction.
//!
//! Each page's content stream is walked with lopdf to produce positioned text
//! fragments; line breaks are rebuilt from vertical jumps between fragments
//! because the format does not encode them explicitly.

use std::collections::HashMap;
use std::panic;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::to_unicode::ToUnicodeMap;
use super::{ExtractError, ExtractedText};

/// Vertical distance (PDF points) beyond which two fragments sit on different lines.
pub const LINE_BREAK_THRESHOLD: f64 = 5.0;

/// `TJ` adjustments are in thousandths of an em; a gap wider than this is a word break.
const KERNING_SPACE_THRESHOLD: f64 = 200.0;

/// Guards the Parent walk when looking up inherited page resources.
const MAX_PARENT_DEPTH: usize = 32;

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A run of text as drawn by a single show-text operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// Baseline position in page space (points).
    pub y: f64,
    /// The next fragment starts on another line.
    pub has_eol: bool,
}

/// Extracts and normalizes the text of every page.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let pages = panic::catch_unwind(|| collect_page_fragments(bytes)).map_err(|_| {
        ExtractError::MalformedDocument("PDF parser aborted on corrupt input".to_string())
    })??;

    let raw = pages
        .iter()
        .map(|fragments| reconstruct_page(fragments))
        .collect::<Vec<_>>()
        .join("\n\n");

    match ExtractedText::new(&raw) {
        Err(ExtractError::EmptyDocument(reason)) => {
            debug!(
                "Fragment walk produced {} chars across {} pages, trying whole-document pass",
                raw.trim().len(),
                pages.len()
            );
            whole_document_pass(bytes).ok_or(ExtractError::EmptyDocument(reason))
        }
        other => other,
    }
}

/// Rebuilds the text of one page from its fragments, in document order.
pub fn reconstruct_page(fragments: &[TextFragment]) -> String {
    let mut page = String::new();
    let mut last_y: Option<f64> = None;

    for fragment in fragments {
        if let Some(prev) = last_y {
            if (fragment.y - prev).abs() > LINE_BREAK_THRESHOLD {
                page.push('\n');
            }
        }

        page.push_str(&fragment.text);
        if !fragment.text.is_empty()
            && !fragment.text.ends_with(char::is_whitespace)
            && !fragment.has_eol
        {
            page.push(' ');
        }

        last_y = Some(fragment.y);
    }

    page
}

fn collect_page_fragments(bytes: &[u8]) -> Result<Vec<Vec<TextFragment>>, ExtractError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::MalformedDocument(format!("not a readable PDF: {e}")))?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractError::MalformedDocument(
            "PDF contains no pages".to_string(),
        ));
    }

    let mut result = Vec::with_capacity(pages.len());
    for (page_num, page_id) in pages {
        let content = doc.get_page_content(page_id).map_err(|e| {
            ExtractError::MalformedDocument(format!("page {page_num} content unreadable: {e}"))
        })?;
        let content = Content::decode(&content).map_err(|e| {
            ExtractError::MalformedDocument(format!("page {page_num} content undecodable: {e}"))
        })?;

        let fonts = page_unicode_maps(&doc, page_id);
        let fragments = TextWalker::new(&fonts).run(&content.operations);
        debug!(
            "Page {}: {} fragments, {} fonts with ToUnicode",
            page_num,
            fragments.len(),
            fonts.len()
        );
        result.push(fragments);
    }

    Ok(result)
}

/// Second pass over documents whose text the fragment walk could not reach.
fn whole_document_pass(bytes: &[u8]) -> Option<ExtractedText> {
    let text = match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!("Whole-document pass failed: {e}");
            return None;
        }
        Err(_) => {
            warn!("Whole-document pass aborted on corrupt input");
            return None;
        }
    };

    let extracted = ExtractedText::new(&text).ok()?;
    warn!(
        "Recovered {} chars with the whole-document pass",
        extracted.len()
    );
    Some(extracted)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// ToUnicode maps keyed by font resource name, honoring inherited resources.
fn page_unicode_maps(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, ToUnicodeMap> {
    let mut maps = HashMap::new();
    let Some(fonts) = inherited_font_dict(doc, page_id) else {
        return maps;
    };

    for (name, font) in fonts.iter() {
        let Ok(font) = resolve(doc, font).as_dict() else {
            continue;
        };
        let Ok(to_unicode) = font.get(b"ToUnicode") else {
            continue;
        };
        let Ok(stream) = resolve(doc, to_unicode).as_stream() else {
            continue;
        };
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        if let Some(map) = ToUnicodeMap::parse(&data) {
            maps.insert(name.clone(), map);
        }
    }

    maps
}

fn inherited_font_dict(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            let resources = resolve(doc, resources).as_dict().ok()?;
            let fonts = resources.get(b"Font").ok()?;
            return resolve(doc, fonts).as_dict().ok();
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

/// `lhs x rhs` in PDF's row-vector convention.
fn multiply(lhs: &Matrix, rhs: &Matrix) -> Matrix {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

/// Interprets the text-related subset of a content stream.
struct TextWalker<'a> {
    fonts: &'a HashMap<Vec<u8>, ToUnicodeMap>,
    font: Option<&'a ToUnicodeMap>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f64,
    fragments: Vec<TextFragment>,
}

impl<'a> TextWalker<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, ToUnicodeMap>) -> Self {
        Self {
            fonts,
            font: None,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            leading: 0.0,
            fragments: Vec::new(),
        }
    }

    fn run(mut self, operations: &[Operation]) -> Vec<TextFragment> {
        for op in operations {
            self.apply(op);
        }
        self.fragments
    }

    fn apply(&mut self, op: &Operation) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tm" => {
                if let Some(m) = matrix_from(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "T*" => self.next_line(),
            "Tf" => {
                self.font = match operands.first() {
                    Some(Object::Name(name)) => self.fonts.get(name),
                    _ => None,
                };
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.push_fragment(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.push_fragment(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let text = self.decode(bytes);
                    self.push_fragment(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let text = self.decode_array(items);
                    self.push_fragment(text);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    /// Baseline of the current text position in page space.
    fn current_y(&self) -> f64 {
        self.tm[4] * self.ctm[1] + self.tm[5] * self.ctm[3] + self.ctm[5]
    }

    fn push_fragment(&mut self, text: String) {
        let y = self.current_y();
        if let Some(last) = self.fragments.last_mut() {
            if (y - last.y).abs() > LINE_BREAK_THRESHOLD {
                last.has_eol = true;
            }
        }
        self.fragments.push(TextFragment {
            text,
            y,
            has_eol: false,
        });
    }

    fn decode_array(&self, items: &[Object]) -> String {
        let mut text = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => text.push_str(&self.decode(bytes)),
                other => {
                    let gap = number(other).unwrap_or(0.0);
                    if -gap > KERNING_SPACE_THRESHOLD && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
        text
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(map) = self.font {
            return map.decode(bytes);
        }
        if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16_lossy(&units);
        }
        bytes
            .iter()
            .filter(|b| **b >= 0x20 || **b == b'\t')
            .map(|b| char::from(*b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::{
        build_pdf, build_pdf_with_operations, build_pdf_with_resources, PdfResources,
    };
    use lopdf::StringFormat;

    /// Identity-H style CMap: 2-byte glyph ids, space at 0x0003, A-Z from 0x0011, a-z from 0x0044.
    const GLYPH_CMAP: &str = r#"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfchar
<0003> <0020>
endbfchar
2 beginbfrange
<0011> <002A> <0041>
<0044> <005D> <0061>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
"#;

    fn glyphs(text: &str) -> Object {
        let bytes = text
            .chars()
            .flat_map(|c| {
                let id: u16 = match c {
                    'A'..='Z' => 0x11 + (c as u16 - 'A' as u16),
                    'a'..='z' => 0x44 + (c as u16 - 'a' as u16),
                    _ => 0x03,
                };
                id.to_be_bytes()
            })
            .collect();
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    fn fragment(text: &str, y: f64, has_eol: bool) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            y,
            has_eol,
        }
    }

    #[test]
    fn test_reconstruct_inserts_newline_on_vertical_jump() {
        let page = reconstruct_page(&[
            fragment("Jane", 700.0, false),
            fragment("Doe", 700.0, true),
            fragment("Engineer", 680.0, false),
        ]);
        assert_eq!(page, "Jane Doe\nEngineer ");
    }

    #[test]
    fn test_reconstruct_ignores_jitter_within_threshold() {
        let page = reconstruct_page(&[fragment("Senior", 700.0, false), fragment("Dev", 703.5, false)]);
        assert_eq!(page, "Senior Dev ");
    }

    #[test]
    fn test_reconstruct_keeps_existing_trailing_space() {
        let page = reconstruct_page(&[fragment("Acme ", 500.0, false), fragment("Corp", 500.0, false)]);
        assert_eq!(page, "Acme Corp ");
    }

    #[test]
    fn test_extract_single_page_lines() {
        let bytes = build_pdf(&[&[
            ("Jane Doe", 720),
            ("jane.doe@example.com", 700),
            ("EXPERIENCE", 670),
            ("Software Engineer", 650),
        ]]);

        let text = extract_pdf_text(&bytes).unwrap();
        assert_eq!(
            text.as_str(),
            "Jane Doe\njane.doe@example.com\nEXPERIENCE\nSoftware Engineer"
        );
    }

    #[test]
    fn test_extract_joins_pages_with_blank_line() {
        let bytes = build_pdf(&[
            &[("Page one heading", 720)],
            &[("Page two heading", 720)],
        ]);

        let text = extract_pdf_text(&bytes).unwrap();
        assert_eq!(text.as_str(), "Page one heading\n\nPage two heading");
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn test_extract_tj_array_kerning_becomes_space() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Machine"),
                    Object::Integer(-250),
                    Object::string_literal("Learning"),
                    Object::Integer(-20),
                    Object::string_literal("!"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let bytes = build_pdf_with_operations(vec![ops]);

        let text = extract_pdf_text(&bytes).unwrap();
        assert_eq!(text.as_str(), "Machine Learning!");
    }

    #[test]
    fn test_extract_follows_leading_and_next_line_operators() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("First line here")]),
            Operation::new("'", vec![Object::string_literal("Second line here")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("Third line here")]),
            Operation::new("ET", vec![]),
        ];
        let bytes = build_pdf_with_operations(vec![ops]);

        let text = extract_pdf_text(&bytes).unwrap();
        assert_eq!(text.as_str(), "First line here\nSecond line here\nThird line here");
    }

    #[test]
    fn test_extract_rejects_garbage_bytes() {
        let err = extract_pdf_text(b"this is definitely not a pdf document").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedDocument(_)));
    }

    #[test]
    fn test_extract_rejects_document_without_pages() {
        let bytes = build_pdf(&[]);
        let err = extract_pdf_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedDocument(_)));
    }

    #[test]
    fn test_extract_image_only_page_is_empty_document() {
        let bytes = build_pdf_with_operations(vec![vec![
            Operation::new("q", vec![]),
            Operation::new("Q", vec![]),
        ]]);
        let err = extract_pdf_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument(_)));
    }

    #[test]
    fn test_extract_decodes_glyph_ids_through_font_to_unicode() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![glyphs("Jane Doe")]),
            Operation::new("Td", vec![0.into(), Object::Integer(-20)]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    glyphs("Staff"),
                    Object::Integer(-300),
                    glyphs("Engineer"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let bytes = build_pdf_with_resources(
            vec![ops],
            PdfResources {
                to_unicode: Some(GLYPH_CMAP),
                ..Default::default()
            },
        );

        let text = extract_pdf_text(&bytes).unwrap();
        assert_eq!(text.as_str(), "Jane Doe\nStaff Engineer");
    }

    #[test]
    fn test_page_unicode_maps_reads_inherited_compressed_cmap() {
        let bytes = build_pdf_with_resources(
            vec![vec![]],
            PdfResources {
                to_unicode: Some(GLYPH_CMAP),
                ..Default::default()
            },
        );
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();

        let maps = page_unicode_maps(&doc, page_id);
        let map = maps.get(b"F1".as_slice()).unwrap();
        assert_eq!(map.decode(&[0x00, 0x1A, 0x00, 0x44]), "Ja");
    }

    #[test]
    fn test_extract_falls_back_to_whole_document_pass() {
        let form = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Jane Doe Senior Engineer")]),
            Operation::new("ET", vec![]),
        ];
        let page = vec![
            Operation::new("q", vec![]),
            Operation::new("Do", vec!["Fm1".into()]),
            Operation::new("Q", vec![]),
        ];
        let bytes = build_pdf_with_resources(
            vec![page],
            PdfResources {
                forms: vec![form],
                ..Default::default()
            },
        );

        // The walk does not enter form XObjects, so the first pass finds nothing.
        let fragments = collect_page_fragments(&bytes).unwrap();
        assert!(fragments.iter().all(Vec::is_empty));

        let text = extract_pdf_text(&bytes).unwrap();
        assert!(text.contains("Jane Doe Senior Engineer"), "got {:?}", text.as_str());
    }

    #[test]
    fn test_extract_short_text_stays_empty_after_both_passes() {
        let bytes = build_pdf(&[&[("Hi", 720)]]);
        let err = extract_pdf_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument(_)));
    }

    #[test]
    fn test_current_y_applies_ctm_translation() {
        let fonts = HashMap::new();
        let fragments = TextWalker::new(&fonts).run(&[
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 100.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![0.into(), 50.into()]),
            Operation::new("Tj", vec![Object::string_literal("x")]),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(fragments.len(), 1);
        assert!((fragments[0].y - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let fonts = HashMap::new();
        let walker = TextWalker::new(&fonts);
        assert_eq!(walker.decode(&[0xFE, 0xFF, 0x00, 0x4A, 0x00, 0xE9]), "Jé");
    }
}
