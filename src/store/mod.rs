//! The document store contract.
//!
//! Two logical records live in a store: a mutable *document* record holding the
//! title and the latest `docJson`, and append-only *snapshot* records. Every
//! write is a whole-field overwrite. Implementations are synchronous and
//! thread-safe; callers that must not block move calls onto the tokio runtime.
//!
//! - [`MemoryStore`] keeps everything in process (tests, ephemeral sessions)
//! - [`FileStore`] keeps one JSON file per record under a directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::types::DocJson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists
    #[error("record {0} not found")]
    NotFound(String),
    /// The id cannot name a record
    #[error("invalid record id {0:?}")]
    InvalidId(String),
    /// Reading or writing the backing storage failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be encoded or decoded
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The store refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The mutable document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document id
    pub id: String,
    /// Display title
    pub title: String,
    /// Latest saved payload; `None` until first written
    #[serde(rename = "docJson", default)]
    pub doc_json: Option<DocJson>,
    /// Creation time
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Time of the last payload or title write
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// An immutable, timestamped copy of a document payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Snapshot id
    pub id: String,
    /// Owning document
    #[serde(rename = "documentId")]
    pub document_id: String,
    /// Copied payload
    #[serde(rename = "docJson")]
    pub doc_json: DocJson,
    /// Creation time
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Number of nodes captured by the snapshot.
    pub fn node_count(&self) -> usize {
        self.doc_json.nodes.len()
    }
}

/// One page of documents, most recently updated first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentPage {
    /// Documents on this page
    pub documents: Vec<DocumentRecord>,
    /// Total number of documents in the store
    pub total: usize,
}

/// Record store backing the editor.
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document with an empty payload.
    fn create_document(&self, title: &str) -> Result<DocumentRecord, StoreError>;

    /// Lists documents ordered by `updated_at` descending, skipping `offset`.
    fn list_documents(&self, offset: usize, limit: usize) -> Result<DocumentPage, StoreError>;

    /// Reads one document.
    fn read_document(&self, id: &str) -> Result<DocumentRecord, StoreError>;

    /// Overwrites a document's payload and its `updated_at`.
    fn update_document(
        &self,
        id: &str,
        doc: &DocJson,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Overwrites a document's title.
    fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError>;

    /// Appends a snapshot of `doc` for `document_id`.
    fn insert_snapshot(&self, document_id: &str, doc: &DocJson) -> Result<SnapshotRecord, StoreError>;

    /// Lists at most `limit` snapshots of a document, newest first.
    fn list_snapshots(&self, document_id: &str, limit: usize) -> Result<Vec<SnapshotRecord>, StoreError>;

    /// Deletes a document together with its snapshots.
    fn delete_document(&self, id: &str) -> Result<(), StoreError>;
}

/// Allocates an id for a new record.
pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
