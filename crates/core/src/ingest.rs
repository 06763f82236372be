use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::extract_blocks;
use crate::index::{CancelToken, DocumentIndex};
use crate::registry::IndexRegistry;
use crate::storage::DocumentStore;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// The document id is the file name, matching how users refer to their
/// uploads everywhere else in the system.
pub fn document_id_for_path(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions<'a> {
    /// Caller-side confirmation that a colliding document may be rebuilt.
    pub replace: bool,
    /// Where to keep the original bytes, when anywhere.
    pub documents: Option<&'a DocumentStore>,
    pub cancel: Option<&'a CancelToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First ingest of this document id.
    Indexed,
    /// Collision confirmed by the caller; the old index was fully swapped out.
    Replaced,
    /// Identical bytes are already indexed; no provider call was made.
    Unchanged,
    /// Collision with different content and no confirmation; nothing changed.
    NeedsConfirmation,
}

/// Runs the upload pipeline for one file: extract, embed, install, and
/// optionally park the original bytes. The two-step collision protocol is
/// composed here; `options.replace` is the caller's answer to it.
pub fn ingest_file(
    path: &Path,
    embedder: &dyn Embedder,
    registry: &IndexRegistry,
    options: &IngestOptions,
) -> Result<IngestOutcome, IngestError> {
    let bytes = fs::read(path)?;
    let document_id = document_id_for_path(path)?;
    let checksum = digest_bytes(&bytes);

    let existing = registry.get(&document_id);
    if let Some(existing) = &existing {
        if existing.source_checksum() == Some(checksum.as_str()) {
            return Ok(IngestOutcome::Unchanged);
        }
        if !options.replace {
            return Ok(IngestOutcome::NeedsConfirmation);
        }
    }

    let blocks = extract_blocks(&document_id, &bytes)?;
    let index = match options.cancel {
        Some(cancel) => DocumentIndex::build_with_cancel(&document_id, blocks, embedder, cancel)?,
        None => DocumentIndex::build(&document_id, blocks, embedder)?,
    }
    .with_source_checksum(checksum);

    registry.put(index)?;
    if let Some(store) = options.documents {
        store.save(&document_id, &bytes)?;
    }

    Ok(if existing.is_some() {
        IngestOutcome::Replaced
    } else {
        IngestOutcome::Indexed
    })
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub indexed: Vec<String>,
    pub replaced: Vec<String>,
    pub unchanged: Vec<String>,
    pub needs_confirmation: Vec<String>,
    pub skipped: Vec<SkippedDocument>,
}

impl IngestionReport {
    /// Documents whose index changed in this run.
    pub fn installed(&self) -> usize {
        self.indexed.len() + self.replaced.len()
    }
}

/// Best-effort ingest of every PDF under `folder`. A document that fails to
/// parse or extract is recorded and skipped; a provider failure or a
/// cancellation aborts the whole run, since every remaining file would hit
/// the same wall and each attempt costs provider calls.
pub fn ingest_folder(
    folder: &Path,
    embedder: &dyn Embedder,
    registry: &IndexRegistry,
    options: &IngestOptions,
) -> Result<IngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut report = IngestionReport::default();

    for path in files {
        let document_id = match document_id_for_path(&path) {
            Ok(document_id) => document_id,
            Err(error) => {
                report.skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                });
                continue;
            }
        };

        match ingest_file(&path, embedder, registry, options) {
            Ok(IngestOutcome::Indexed) => report.indexed.push(document_id),
            Ok(IngestOutcome::Replaced) => report.replaced.push(document_id),
            Ok(IngestOutcome::Unchanged) => report.unchanged.push(document_id),
            Ok(IngestOutcome::NeedsConfirmation) => {
                report.needs_confirmation.push(document_id)
            }
            Err(error @ IngestError::Embedding(_)) | Err(error @ IngestError::Cancelled(_)) => {
                return Err(error);
            }
            Err(error) => report.skipped.push(SkippedDocument {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}
