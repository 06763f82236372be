use crate::error::IngestError;
use crate::index::DocumentIndex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Subdirectory names used when both stores share one data directory.
pub const INDEX_SUBDIR: &str = "indexes";
pub const DOCUMENT_SUBDIR: &str = "documents";

/// Characters kept verbatim when a document id becomes a file name;
/// everything else (separators included) is percent-encoded.
const FILENAME_KEEP: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

fn encode_document_id(document_id: &str) -> String {
    utf8_percent_encode(document_id, FILENAME_KEEP).to_string()
}

/// Durable home of built indexes: one JSON file per document, named after
/// the encoded document id.
#[derive(Debug)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", encode_document_id(document_id)))
    }

    /// Writes to a temp file and renames it into place, so a crash mid-write
    /// never leaves a truncated index behind.
    pub fn save(&self, index: &DocumentIndex) -> Result<(), IngestError> {
        let path = self.path_for(index.document_id());
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec(index)?)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    pub fn remove(&self, document_id: &str) -> Result<bool, IngestError> {
        match fs::remove_file(self.path_for(document_id)) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Loads every persisted index without touching the embedding provider.
    /// Entries that cannot be read or parsed are skipped with a warning so
    /// one corrupt file cannot take the whole corpus offline.
    pub fn load_all(&self) -> Result<Vec<DocumentIndex>, IngestError> {
        let mut indexes = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let raw = match fs::read(&path) {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping unreadable index file");
                    continue;
                }
            };
            match serde_json::from_slice::<DocumentIndex>(&raw) {
                Ok(index) => indexes.push(index),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping corrupt index file");
                }
            }
        }

        Ok(indexes)
    }
}

/// Keeps the original uploaded bytes, separate from the indexes, so replace
/// and download flows never depend on the source file still existing where
/// it was ingested from.
#[derive(Debug)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.bin", encode_document_id(document_id)))
    }

    /// Same temp-and-rename write as the index store. Finals always end in
    /// `.bin` and in-flight writes in `.bin.tmp`, so a temp name can never
    /// equal another document's final name.
    pub fn save(&self, document_id: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        let path = self.path_for(document_id);
        let temp = path.with_extension("bin.tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &path)?;
        Ok(path)
    }

    pub fn load(&self, document_id: &str) -> Result<Option<Vec<u8>>, IngestError> {
        match fs::read(self.path_for(document_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub fn remove(&self, document_id: &str) -> Result<bool, IngestError> {
        match fs::remove_file(self.path_for(document_id)) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::index::DocumentIndex;
    use crate::models::TextBlock;
    use tempfile::tempdir;

    fn sample_index(document_id: &str, texts: &[&str]) -> DocumentIndex {
        let blocks = texts
            .iter()
            .enumerate()
            .map(|(i, text)| TextBlock {
                document_id: document_id.to_string(),
                page_number: 1,
                ordinal: i as u32 + 1,
                raw_text: text.to_string(),
                cleaned_text: text.to_string(),
            })
            .collect();
        DocumentIndex::build(document_id, blocks, &HashingEmbedder::default())
            .unwrap()
            .with_source_checksum("abc123")
    }

    #[test]
    fn save_then_load_all_round_trips() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        let index = sample_index("notes.pdf", &["Apples", "Bananas"]);
        store.save(&index).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].document_id(), "notes.pdf");
        assert_eq!(loaded[0].len(), 2);
        assert_eq!(loaded[0].source_checksum(), Some("abc123"));
        assert_eq!(loaded[0].blocks()[0].embedding, index.blocks()[0].embedding);
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        store.save(&sample_index("good.pdf", &["Apples"])).unwrap();
        std::fs::write(dir.path().join("bad.json"), b"not json").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].document_id(), "good.pdf");
    }

    #[test]
    fn removing_a_missing_index_reports_false() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        assert!(!store.remove("ghost.pdf").unwrap());

        store.save(&sample_index("notes.pdf", &["Apples"])).unwrap();
        assert!(store.remove("notes.pdf").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn hostile_document_ids_stay_inside_the_store_dir() {
        let dir = tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        let index = sample_index("../sub dir/notes.pdf", &["Apples"]);
        store.save(&index).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].document_id(), "../sub dir/notes.pdf");

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].parent().unwrap(), dir.path());
    }

    #[test]
    fn document_store_round_trips_bytes() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        store.save("notes.pdf", b"%PDF-1.5 fake").unwrap();
        assert_eq!(
            store.load("notes.pdf").unwrap().as_deref(),
            Some(b"%PDF-1.5 fake".as_slice())
        );

        assert!(store.remove("notes.pdf").unwrap());
        assert_eq!(store.load("notes.pdf").unwrap(), None);
        assert!(!store.remove("notes.pdf").unwrap());
    }

    #[test]
    fn a_save_never_clobbers_a_neighbouring_document() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        // "report.tmp" is a legitimate document id; saving "report" must not
        // write through it on the way to its own final name.
        store.save("report.tmp", b"first upload").unwrap();
        store.save("report", b"second upload").unwrap();

        assert_eq!(
            store.load("report.tmp").unwrap().as_deref(),
            Some(b"first upload".as_slice())
        );
        assert_eq!(
            store.load("report").unwrap().as_deref(),
            Some(b"second upload".as_slice())
        );
    }
}
