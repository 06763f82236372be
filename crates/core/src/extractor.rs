use crate::blocks::{self, list_marker_regex};
use crate::error::IngestError;
use crate::models::TextBlock;
use lopdf::Document;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Extraction seam. Implementations turn raw document bytes into per-page
/// text with 1-based, ascending page numbers.
pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // A page that fails text decoding is skipped; the document as a
            // whole only fails when no page yields anything.
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(_) => continue,
            };

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::UnsupportedDocument(
                "pdf has no readable text on any page".to_string(),
            ));
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(bytes)
}

/// Upload-side extraction: parse the bytes, split every page into blocks,
/// and label each block with the owning document id.
pub fn extract_blocks(document_id: &str, bytes: &[u8]) -> Result<Vec<TextBlock>, IngestError> {
    let marker = list_marker_regex()?;
    let pages = extract_page_texts(bytes)?;

    let mut all = Vec::new();
    for page in &pages {
        all.extend(blocks::page_blocks(document_id, page, &marker));
    }

    if all.is_empty() {
        return Err(IngestError::UnsupportedDocument(
            "pdf text reduced to nothing after cleanup".to_string(),
        ));
    }

    Ok(all)
}
