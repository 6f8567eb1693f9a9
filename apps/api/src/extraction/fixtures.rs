//! In-memory document builders shared by tests.

use std::io::{Cursor, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use zip::write::FileOptions;

/// Builds a PDF where every page is a list of `(line, baseline_y)` pairs.
pub fn build_pdf(pages: &[&[(&str, i64)]]) -> Vec<u8> {
    let page_operations = pages
        .iter()
        .map(|lines| {
            let mut ops = Vec::new();
            for (text, y) in lines.iter() {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
                ops.push(Operation::new("Td", vec![72.into(), Object::Integer(*y)]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
                ops.push(Operation::new("ET", vec![]));
            }
            ops
        })
        .collect();
    build_pdf_with_operations(page_operations)
}

/// Extra resources shared by every page of a fixture PDF.
#[derive(Debug, Default)]
pub struct PdfResources<'a> {
    /// CMap attached to `F1` as a Flate-compressed `/ToUnicode` stream.
    pub to_unicode: Option<&'a str>,
    /// Form XObjects, registered as `Fm1`, `Fm2`, ... in order.
    pub forms: Vec<Vec<Operation>>,
}

/// Builds a PDF with one page per operation list, all sharing a Helvetica font `F1`.
pub fn build_pdf_with_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    build_pdf_with_resources(pages, PdfResources::default())
}

/// Like `build_pdf_with_operations`, with the given extras on the inherited resources.
pub fn build_pdf_with_resources(pages: Vec<Vec<Operation>>, extras: PdfResources<'_>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    };
    if let Some(cmap) = extras.to_unicode {
        let mut stream = Stream::new(dictionary! {}, cmap.as_bytes().to_vec());
        stream.compress().expect("cmap compresses");
        assert!(stream.dict.get(b"Filter").is_ok(), "cmap too short to compress");
        font.set("ToUnicode", doc.add_object(stream));
    }
    let font_id = doc.add_object(font);

    let mut xobjects = Dictionary::new();
    for (index, operations) in extras.forms.into_iter().enumerate() {
        let content = Content { operations };
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            },
            content.encode().expect("form content encodes"),
        ));
        xobjects.set(format!("Fm{}", index + 1), form_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
        "XObject" => xobjects,
    });

    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("pdf saves");
    buffer
}

/// Builds a minimal DOCX package whose body holds the given `document.xml` body markup.
pub fn build_docx_from_body(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", FileOptions::default())
        .expect("zip entry");
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .expect("zip write");
    writer
        .start_file("word/document.xml", FileOptions::default())
        .expect("zip entry");
    writer.write_all(document.as_bytes()).expect("zip write");
    writer.finish().expect("zip finish").into_inner()
}

/// Builds a DOCX with one paragraph (single run) per line.
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape(p)))
        .collect();
    build_docx_from_body(&body)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
