//! PDF text extraction and document info
//!
//! Text comes from a best-effort probe with two strategies: lopdf's page
//! text extraction first, then a raw scan of the content streams for text
//! showing operators. The first strategy that recovers enough text wins.

use crate::errors::ResolverError;
use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Document information dictionary plus page count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub num_pages: usize,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
    pub producer: String,
}

fn load(path: &Path) -> Result<Document, ResolverError> {
    Document::load(path).map_err(|e| ResolverError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })
}

/// Non-whitespace character count
pub fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Extract text from a PDF file, requiring at least `min_chars` non-whitespace characters.
pub fn extract_text_from_pdf(path: &Path, min_chars: usize) -> Result<String, ResolverError> {
    let doc = load(path)?;
    extract_text_from_document(&doc, path, min_chars)
}

fn extract_text_from_document(
    doc: &Document,
    path: &Path,
    min_chars: usize,
) -> Result<String, ResolverError> {
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(page_count = page_numbers.len(), "Extracting text from PDF");

    match doc.extract_text(&page_numbers) {
        Ok(text) => {
            let cleaned = clean_text(&text);
            if visible_chars(&cleaned) >= min_chars.max(1) {
                return Ok(cleaned);
            }
            debug!(chars = visible_chars(&cleaned), "Page text extraction came back short");
        }
        Err(e) => warn!(error = %e, "Page text extraction failed, scanning content streams"),
    }

    let mut text = String::new();
    for (page_num, page_id) in doc.get_pages() {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                text.push_str(&extract_text_from_content(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if visible_chars(&cleaned) >= min_chars.max(1) {
        return Ok(cleaned);
    }

    Err(ResolverError::NoText {
        path: path.display().to_string(),
    })
}

/// Read page count and the document information dictionary.
pub fn pdf_info(path: &Path) -> Result<PdfInfo, ResolverError> {
    let doc = load(path)?;

    let info_dict = doc.trailer.get(b"Info").ok().and_then(|obj| match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    });

    let field = |key: &[u8]| -> String {
        info_dict
            .and_then(|dict| dict.get(key).ok())
            .and_then(|obj| obj.as_str().ok())
            .map(decode_info_string)
            .unwrap_or_default()
    };

    Ok(PdfInfo {
        num_pages: doc.get_pages().len(),
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
    })
}

/// Info strings are either PDFDocEncoding or UTF-16BE with a BOM.
fn decode_info_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extract text from PDF content stream
fn extract_text_from_content(content: &[u8]) -> String {
    // Looks for text between BT and ET operators
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Text shown by a single `Tj`, `'`, `"` or `TJ` operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if end > start {
            return Some(decode_pdf_string(&line[start + 1..end]));
        }
        return None;
    }

    // [(text) num (text) num] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Collapse whitespace runs and drop byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
