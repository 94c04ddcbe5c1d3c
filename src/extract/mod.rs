//! Text sampling
//!
//! Pulls a bounded prefix of a document's text, enough for language
//! identification:
//!
//! - PDF: text of at most the first `pdf_pages` pages, concatenated
//! - Plain text (`.txt`, `.md`): the first `sample_chars` characters
//! - Anything else is read as DOCX: full body text truncated to `sample_chars`
//!
//! Pages or paragraphs without extractable text contribute an empty string.

use crate::config::LanguageConfig;
use std::path::Path;
use thiserror::Error;

pub mod docx;
pub mod pdf;

/// Sampling errors
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Sampling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLimits {
    pub chars: usize,
    pub pdf_pages: usize,
}

impl Default for SampleLimits {
    fn default() -> Self {
        Self {
            chars: 500,
            pdf_pages: 4,
        }
    }
}

impl From<&LanguageConfig> for SampleLimits {
    fn from(config: &LanguageConfig) -> Self {
        Self {
            chars: config.sample_chars,
            pdf_pages: config.pdf_pages,
        }
    }
}

/// Document format, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Docx,
}

impl DocumentFormat {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "txt" | "md" => DocumentFormat::PlainText,
            _ => DocumentFormat::Docx,
        }
    }
}

/// Extract a text sample from a document
pub fn sample(path: &Path, limits: SampleLimits) -> Result<String, SampleError> {
    match DocumentFormat::of(path) {
        DocumentFormat::Pdf => pdf::sample_pages(path, limits.pdf_pages),
        DocumentFormat::PlainText => sample_plain_text(path, limits.chars),
        DocumentFormat::Docx => docx::sample(path, limits.chars),
    }
}

fn sample_plain_text(path: &Path, max_chars: usize) -> Result<String, SampleError> {
    let bytes = std::fs::read(path)?;
    Ok(truncate_chars(&String::from_utf8_lossy(&bytes), max_chars))
}

/// First `max_chars` characters of `text`
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dispatch() {
        assert_eq!(DocumentFormat::of(Path::new("a.PDF")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::of(Path::new("a.md")), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::of(Path::new("a.docx")), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::of(Path::new("a.doc")), DocumentFormat::Docx);
    }

    #[test]
    fn test_plain_text_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "ñ".repeat(600)).unwrap();

        let text = sample(&path, SampleLimits::default()).unwrap();
        assert_eq!(text.chars().count(), 500);
    }

    #[test]
    fn test_missing_file() {
        let result = sample(Path::new("/nonexistent/notes.txt"), SampleLimits::default());
        assert!(matches!(result, Err(SampleError::IoError(_))));
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("hola", 500), "hola");
        assert_eq!(truncate_chars("", 500), "");
    }
}
