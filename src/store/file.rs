use super::{new_record_id, DocumentPage, DocumentRecord, DocumentStore, SnapshotRecord, StoreError};
use crate::types::DocJson;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Directory-backed store with one JSON file per record:
///
/// ```text
/// <root>/documents/<id>.json
/// <root>/snapshots/<document id>/<sequence>-<snapshot id>.json
/// ```
///
/// The zero-padded sequence number grows with every snapshot of a document and
/// orders snapshots that share a creation time.
///
/// Files are replaced atomically (write to a temporary sibling, then rename).
/// A process-wide lock serializes read-modify-write sequences on a record.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (and creates, if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("documents"))?;
        fs::create_dir_all(root.join("snapshots"))?;
        debug!("Opened file store at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// The directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.root.join("documents").join(format!("{id}.json")))
    }

    fn snapshot_dir(&self, document_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(document_id)?;
        Ok(self.root.join("snapshots").join(document_id))
    }

    fn with_write_lock<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".to_string()))?;
        f()
    }

    fn read_record(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        let path = self.document_path(id)?;
        read_json(&path).map_err(|e| match e {
            StoreError::Io(io) if io.kind() == ErrorKind::NotFound => StoreError::NotFound(id.to_string()),
            other => other,
        })
    }
}

impl DocumentStore for FileStore {
    fn create_document(&self, title: &str) -> Result<DocumentRecord, StoreError> {
        let now = Utc::now();
        let record = DocumentRecord {
            id: new_record_id(),
            title: title.to_string(),
            doc_json: Some(DocJson::default()),
            created_at: now,
            updated_at: now,
        };
        let path = self.document_path(&record.id)?;
        self.with_write_lock(|| write_json(&path, &record))?;
        Ok(record)
    }

    fn list_documents(&self, offset: usize, limit: usize) -> Result<DocumentPage, StoreError> {
        let mut documents = Vec::new();
        for entry in fs::read_dir(self.root.join("documents"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<DocumentRecord>(&path) {
                Ok(record) => documents.push(record),
                Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
            }
        }
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        let total = documents.len();
        let documents = documents.into_iter().skip(offset).take(limit).collect();
        Ok(DocumentPage { documents, total })
    }

    fn read_document(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        self.read_record(id)
    }

    fn update_document(
        &self,
        id: &str,
        doc: &DocJson,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_write_lock(|| {
            let mut record = self.read_record(id)?;
            record.doc_json = Some(doc.clone());
            record.updated_at = updated_at;
            write_json(&self.document_path(id)?, &record)
        })
    }

    fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.with_write_lock(|| {
            let mut record = self.read_record(id)?;
            record.title = title.to_string();
            record.updated_at = Utc::now();
            write_json(&self.document_path(id)?, &record)
        })
    }

    fn insert_snapshot(&self, document_id: &str, doc: &DocJson) -> Result<SnapshotRecord, StoreError> {
        // The owning document must exist
        self.read_record(document_id)?;
        let dir = self.snapshot_dir(document_id)?;
        self.with_write_lock(|| {
            fs::create_dir_all(&dir)?;
            let seq = next_snapshot_seq(&dir)?;
            let record = SnapshotRecord {
                id: new_record_id(),
                document_id: document_id.to_string(),
                doc_json: doc.clone(),
                created_at: Utc::now(),
            };
            write_json(&dir.join(format!("{seq:010}-{}.json", record.id)), &record)?;
            Ok(record)
        })
    }

    fn list_snapshots(&self, document_id: &str, limit: usize) -> Result<Vec<SnapshotRecord>, StoreError> {
        let dir = self.snapshot_dir(document_id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<SnapshotRecord>(&path) {
                Ok(record) => snapshots.push((snapshot_seq(&path).unwrap_or(0), record)),
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }
        snapshots.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| seq_b.cmp(seq_a))
        });
        Ok(snapshots.into_iter().take(limit).map(|(_, record)| record).collect())
    }

    fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let path = self.document_path(id)?;
        let snapshots = self.snapshot_dir(id)?;
        self.with_write_lock(|| {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id.to_string())),
                Err(e) => return Err(e.into()),
            }
            match fs::remove_dir_all(&snapshots) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Record ids become file names, so only `[A-Za-z0-9-]` is accepted.
fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Sequence prefix of a snapshot file name, `None` for unprefixed names.
fn snapshot_seq(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let (prefix, _) = stem.split_once('-')?;
    prefix.parse().ok()
}

fn next_snapshot_seq(dir: &Path) -> Result<u64, StoreError> {
    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        if let Some(seq) = snapshot_seq(&entry?.path()) {
            highest = highest.max(seq);
        }
    }
    Ok(highest + 1)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
