use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::TextBlock;
use regex::Regex;

/// Leading bullet glyphs and list enumerators ("3.", "(b)", "a)") that add
/// nothing to the meaning of a block. Dash-style markers must be followed by
/// whitespace so negative numbers keep their sign.
pub const LIST_MARKER_PATTERN: &str =
    r"^\s*(?:[•◦▪‣·∙*]+\s*|[-–—]+\s+|\(?\d{1,3}[.)]\s+|\(?[A-Za-z][.)]\s+)";

pub fn list_marker_regex() -> Result<Regex, IngestError> {
    Ok(Regex::new(LIST_MARKER_PATTERN)?)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits one page of extracted text into raw block fragments. Blank lines
/// separate paragraphs and every list item opens a block of its own;
/// unmarked continuation lines stay with the block they follow.
pub fn split_page_blocks(page_text: &str, marker: &Regex) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in page_text.lines() {
        if line.trim().is_empty() {
            flush_block(&mut blocks, &mut current);
            continue;
        }
        if marker.is_match(line) {
            flush_block(&mut blocks, &mut current);
        }
        current.push(line);
    }
    flush_block(&mut blocks, &mut current);

    blocks
}

fn flush_block(blocks: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    let raw = current.join("\n").trim().to_string();
    if !raw.is_empty() {
        blocks.push(raw);
    }
    current.clear();
}

/// Strips the list marker from every line of a fragment and collapses the
/// remainder onto a single normalized line.
pub fn clean_block_text(raw: &str, marker: &Regex) -> String {
    let stripped = raw
        .lines()
        .map(|line| marker.replace(line, ""))
        .collect::<Vec<_>>()
        .join(" ");
    normalize_whitespace(&stripped)
}

/// Turns one extracted page into ordered text blocks, dropping fragments
/// that clean down to nothing.
pub fn page_blocks(document_id: &str, page: &PageText, marker: &Regex) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();

    for raw in split_page_blocks(&page.text, marker) {
        let cleaned = clean_block_text(&raw, marker);
        if cleaned.is_empty() {
            continue;
        }
        let ordinal = blocks.len() as u32 + 1;
        blocks.push(TextBlock {
            document_id: document_id.to_string(),
            page_number: page.number,
            ordinal,
            raw_text: raw,
            cleaned_text: cleaned,
        });
    }

    blocks
}
