//! PDF sampling via `pdf-extract`

use super::SampleError;
use std::path::Path;

/// Concatenated text of at most the first `max_pages` pages
pub fn sample_pages(path: &Path, max_pages: usize) -> Result<String, SampleError> {
    let bytes = std::fs::read(path)?;
    sample_pages_from_mem(&bytes, max_pages)
}

/// Same as [`sample_pages`], for a PDF already in memory
pub fn sample_pages_from_mem(bytes: &[u8], max_pages: usize) -> Result<String, SampleError> {
    // pdf-extract can panic on malformed input; treat that as a failed extraction.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));

    let pages = match result {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => return Err(SampleError::Pdf(e.to_string())),
        Err(_) => return Err(SampleError::Pdf("extractor panicked".into())),
    };

    Ok(pages.into_iter().take(max_pages).collect())
}
