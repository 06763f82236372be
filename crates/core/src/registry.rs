use crate::error::{IngestError, SearchError};
use crate::index::{DocumentIndex, EmbeddedBlock};
use crate::storage::IndexStore;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Maps document ids to their live indexes. Intended to be constructed once
/// per process and shared behind `Arc`; every operation takes `&self`.
///
/// Replace is an atomic swap: the new index is built entirely off to the
/// side, then installed with one map insert. Readers holding the old `Arc`
/// keep a complete old version, never a mixture.
pub struct IndexRegistry {
    indexes: RwLock<HashMap<String, Arc<DocumentIndex>>>,
    store: Option<IndexStore>,
}

impl IndexRegistry {
    /// Registry with no persistence, for tests and hosts that handle
    /// durability themselves.
    pub fn in_memory() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Registry backed by `dir`: loads every index persisted there and
    /// persists every later `put` and `remove`. The embedding provider is
    /// not involved; restart cost is deserialization only.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let store = IndexStore::open(dir)?;
        let mut indexes = HashMap::new();
        for index in store.load_all()? {
            indexes.insert(index.document_id().to_string(), Arc::new(index));
        }
        debug!(documents = indexes.len(), "opened index registry");

        Ok(Self {
            indexes: RwLock::new(indexes),
            store: Some(store),
        })
    }

    /// Installs or replaces the index for its document id in one swap.
    /// `put` never refuses a replace: the collision check (`contains`) and
    /// any confirmation belong to the caller. Persistence happens before
    /// installation, so a failed write installs nothing.
    pub fn put(&self, index: DocumentIndex) -> Result<(), IngestError> {
        if let Some(store) = &self.store {
            store.save(&index)?;
        }

        let document_id = index.document_id().to_string();
        let replaced = self
            .indexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.clone(), Arc::new(index))
            .is_some();
        debug!(document_id = document_id.as_str(), replaced, "installed document index");

        Ok(())
    }

    /// Drops the index and its persisted file. Removing an absent id is a
    /// no-op reported as `Ok(false)`. The persisted file goes first,
    /// mirroring `put`: a failed store operation leaves the in-memory index
    /// in place, so a reopened registry never resurrects a document that
    /// memory had already dropped.
    pub fn remove(&self, document_id: &str) -> Result<bool, IngestError> {
        let mut removed = false;
        if let Some(store) = &self.store {
            removed = store.remove(document_id)?;
        }

        removed |= self
            .indexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id)
            .is_some();
        if removed {
            debug!(document_id, "removed document index");
        }

        Ok(removed)
    }

    pub fn get(&self, document_id: &str) -> Option<Arc<DocumentIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(document_id)
    }

    pub fn list_ids(&self) -> BTreeSet<String> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots the selected documents' indexes. An empty selection means
    /// every document; ids with no live index are dropped (the caller may
    /// hold a selection that raced a remove); duplicates count once. Members
    /// come back ordered by document id.
    pub fn combined_view(&self, document_ids: &[String]) -> CombinedView {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);

        let mut members: Vec<Arc<DocumentIndex>> = if document_ids.is_empty() {
            indexes.values().cloned().collect()
        } else {
            let mut seen = HashSet::new();
            document_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .filter_map(|id| indexes.get(id).cloned())
                .collect()
        };
        members.sort_by(|left, right| left.document_id().cmp(right.document_id()));

        CombinedView { members }
    }
}

/// Transient snapshot answering one multi-document query. Each member is the
/// complete index its document had when the view was created; a concurrent
/// replace affects later views, not this one. Nothing here is persisted.
pub struct CombinedView {
    members: Vec<Arc<DocumentIndex>>,
}

impl CombinedView {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|member| member.document_id())
            .collect()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &EmbeddedBlock> {
        self.members
            .iter()
            .flat_map(|member| member.blocks().iter())
    }

    pub fn block_count(&self) -> usize {
        self.members.iter().map(|member| member.len()).sum()
    }

    /// Merged top-k across members: per-member linear scans, then one global
    /// ordering by score, with ties resolved by document id, page, ordinal.
    pub fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<(&EmbeddedBlock, f32)>, SearchError> {
        if top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        let mut merged = Vec::new();
        for member in &self.members {
            merged.extend(member.query(query_vector, top_k)?);
        }

        merged.sort_by(|left, right| {
            right
                .1
                .total_cmp(&left.1)
                .then_with(|| left.0.block.document_id.cmp(&right.0.block.document_id))
                .then_with(|| left.0.block.page_number.cmp(&right.0.block.page_number))
                .then_with(|| left.0.block.ordinal.cmp(&right.0.block.ordinal))
        });
        merged.truncate(top_k);

        Ok(merged)
    }
}
