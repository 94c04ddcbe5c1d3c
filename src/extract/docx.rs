//! DOCX sampling
//!
//! Reads `word/document.xml` from the OOXML zip container and joins the text
//! runs of each paragraph, one paragraph per line.

use super::{truncate_chars, SampleError};
use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;

/// Body text truncated to `max_chars` characters
pub fn sample(path: &Path, max_chars: usize) -> Result<String, SampleError> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| SampleError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| SampleError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;

    let text = parse_paragraphs(&xml)?.join("\n");
    Ok(truncate_chars(&text, max_chars))
}

/// Collect non-empty paragraphs from word/document.xml.
fn parse_paragraphs(xml: &str) -> Result<Vec<String>, SampleError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.name().as_ref(), b"w:tab" | b"w:br") {
                    current.push(' ');
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let raw = e.into_inner();
                let raw = String::from_utf8_lossy(&raw);
                match quick_xml::escape::unescape(&raw) {
                    Ok(text) => current.push_str(&text),
                    Err(_) => current.push_str(&raw),
                }
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                let entity = format!("&{};", String::from_utf8_lossy(&e));
                if let Ok(text) = quick_xml::escape::unescape(&entity) {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SampleError::Docx(e.to_string())),
        }
        buf.clear();
    }

    Ok(paragraphs)
}
