use anyhow::{Context, Result};
use lopdf::Document;
use std::path::Path;

use crate::domain::embedding::TextExtractor;

/// Extracts page text with lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        extract_text_from_pdf(path)
    }
}

/// Returns the text of every readable page joined by newlines.
///
/// Pages whose content cannot be decoded are skipped; only a document that
/// cannot be opened at all is an error.
pub fn extract_text_from_pdf(path: &Path) -> Result<String> {
    let doc = Document::load(path).with_context(|| format!("Failed to open PDF {}", path.display()))?;

    let mut texts = Vec::new();
    for page_num in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_num]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                log::debug!("Skipping unreadable page {} of {}: {}", page_num, path.display(), e);
            }
        }
    }
    Ok(texts.join("\n"))
}
