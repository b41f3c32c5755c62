//! Fixtures shared by the resolver tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const LINES: &[&str] = &[
    "Attention Is All You Need: a study of transformer architectures",
    "We propose a new simple network architecture based solely on attention",
    "mechanisms, dispensing with recurrence and convolutions entirely.",
    "Experiments on two machine translation tasks show these models to be",
    "superior in quality while being more parallelizable and requiring",
    "significantly less time to train than recurrent alternatives.",
    "The model achieves strong results on the WMT 2014 benchmarks and",
    "generalizes well to other tasks such as constituency parsing.",
    "Section 1 introduces the problem. Section 2 reviews related work.",
    "Section 3 describes the encoder and decoder stacks in detail.",
    "Section 4 motivates self-attention. Section 5 covers training.",
    "Section 6 reports results and Section 7 concludes the paper.",
];

fn build_pdf(operations: Vec<Operation>, title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let content = Content { operations };
    let encoded = content.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("paperhound-tests"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// One-page PDF with well over 100 characters of extractable text
pub fn text_pdf() -> Vec<u8> {
    let mut operations = Vec::new();
    for (i, line) in LINES.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
        operations.push(Operation::new("Td", vec![40.into(), (780 - 20 * i as i64).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let bytes = build_pdf(operations, Some("Attention Test Paper"));
    assert!(bytes.len() > 1024);
    bytes
}

/// Structurally valid PDF above the size threshold with no text at all
pub fn image_only_pdf() -> Vec<u8> {
    let mut operations = Vec::new();
    for i in 0..200i64 {
        operations.push(Operation::new(
            "re",
            vec![(i % 50).into(), (i * 3).into(), 10.into(), 10.into()],
        ));
        operations.push(Operation::new("f", vec![]));
    }
    let bytes = build_pdf(operations, None);
    assert!(bytes.len() > 1024);
    bytes
}

/// HTML error page of exactly `len` bytes
pub fn html_page(len: usize) -> Vec<u8> {
    let mut page = b"<!DOCTYPE html><html><head><title>403 Forbidden</title></head><body>".to_vec();
    page.resize(len.saturating_sub(14), b' ');
    page.extend_from_slice(b"</body></html>");
    page.truncate(len);
    page
}
