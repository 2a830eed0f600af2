use super::{new_record_id, DocumentPage, DocumentRecord, DocumentStore, SnapshotRecord, StoreError};
use crate::types::DocJson;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, DocumentRecord>,
    /// Insertion order doubles as the tiebreak for equal timestamps
    snapshots: Vec<SnapshotRecord>,
}

/// In-process store. Can be told to fail writes, and counts payload writes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
    document_writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`] until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `update_document` calls so far.
    pub fn document_writes(&self) -> usize {
        self.document_writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn create_document(&self, title: &str) -> Result<DocumentRecord, StoreError> {
        self.check_writable()?;
        let now = Utc::now();
        let record = DocumentRecord {
            id: new_record_id(),
            title: title.to_string(),
            doc_json: Some(DocJson::default()),
            created_at: now,
            updated_at: now,
        };
        self.lock()?
            .documents
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn list_documents(&self, offset: usize, limit: usize) -> Result<DocumentPage, StoreError> {
        let state = self.lock()?;
        let mut documents: Vec<DocumentRecord> = state.documents.values().cloned().collect();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        let total = documents.len();
        let documents = documents.into_iter().skip(offset).take(limit).collect();
        Ok(DocumentPage { documents, total })
    }

    fn read_document(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        self.lock()?
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_document(
        &self,
        id: &str,
        doc: &DocJson,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.lock()?;
        let record = state
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.doc_json = Some(doc.clone());
        record.updated_at = updated_at;
        self.document_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.lock()?;
        let record = state
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.title = title.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    fn insert_snapshot(&self, document_id: &str, doc: &DocJson) -> Result<SnapshotRecord, StoreError> {
        self.check_writable()?;
        let mut state = self.lock()?;
        if !state.documents.contains_key(document_id) {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        let record = SnapshotRecord {
            id: new_record_id(),
            document_id: document_id.to_string(),
            doc_json: doc.clone(),
            created_at: Utc::now(),
        };
        state.snapshots.push(record.clone());
        Ok(record)
    }

    fn list_snapshots(&self, document_id: &str, limit: usize) -> Result<Vec<SnapshotRecord>, StoreError> {
        let state = self.lock()?;
        let mut snapshots: Vec<SnapshotRecord> = state
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        // Stable: equal timestamps stay newest-inserted first
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        Ok(snapshots)
    }

    fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.lock()?;
        if state.documents.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        state.snapshots.retain(|s| s.document_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_read_update() {
        let store = MemoryStore::new();
        let record = store.create_document("Plan").unwrap();

        let read = store.read_document(&record.id).unwrap();
        assert_eq!(read.title, "Plan");
        assert_eq!(read.doc_json, Some(DocJson::default()));

        let later = Utc::now();
        store.update_document(&record.id, &DocJson::default(), later).unwrap();
        store.update_title(&record.id, "Renamed").unwrap();
        let read = store.read_document(&record.id).unwrap();
        assert_eq!(read.title, "Renamed");
        assert_eq!(store.document_writes(), 1);
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.read_document("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_document("nope", &DocJson::default(), Utc::now()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_failing_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        let record = store.create_document("Plan").unwrap();
        store.set_fail_writes(true);

        assert!(matches!(
            store.update_title(&record.id, "x"),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.read_document(&record.id).unwrap().title, "Plan");
        assert_eq!(store.document_writes(), 0);
    }

    #[test]
    fn test_snapshots_listed_newest_first_and_bounded() {
        let store = MemoryStore::new();
        let record = store.create_document("Plan").unwrap();
        let other = store.create_document("Other").unwrap();
        let ids: Vec<String> = (0..5)
            .map(|_| store.insert_snapshot(&record.id, &DocJson::default()).unwrap().id)
            .collect();
        store.insert_snapshot(&other.id, &DocJson::default()).unwrap();

        let listed = store.list_snapshots(&record.id, 3).unwrap();
        let listed_ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(listed_ids, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);
    }

    #[test]
    fn test_delete_removes_document_and_snapshots() {
        let store = MemoryStore::new();
        let record = store.create_document("Plan").unwrap();
        store.insert_snapshot(&record.id, &DocJson::default()).unwrap();

        store.delete_document(&record.id).unwrap();

        assert!(store.read_document(&record.id).is_err());
        assert!(store.list_snapshots(&record.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_documents_paginates_by_recency() {
        let store = MemoryStore::new();
        let first = store.create_document("first").unwrap();
        let second = store.create_document("second").unwrap();
        let third = store.create_document("third").unwrap();
        store
            .update_document(&first.id, &DocJson::default(), Utc::now() + chrono::Duration::seconds(5))
            .unwrap();

        let page = store.list_documents(0, 2).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].id, first.id);

        let rest = store.list_documents(2, 2).unwrap();
        assert_eq!(rest.documents.len(), 1);
        assert!([second.id, third.id].contains(&rest.documents[0].id));
    }
}
