//! The document library: a paginated list of stored mindmaps with create and
//! delete.

use crate::constants::NEW_DOCUMENT_TITLE;
use crate::store::{DocumentPage, DocumentRecord, DocumentStore};
use log::{info, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug)]
enum Completion {
    Listed { seq: u64, page: DocumentPage },
    ListFailed { seq: u64, error: String },
    Created(DocumentRecord),
    CreateFailed(String),
    Deleted(String),
    DeleteFailed(String),
}

/// Outcomes the screen reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// A new document exists and should be opened
    Created(DocumentRecord),
    /// A document was deleted
    Deleted(String),
}

/// Paginated document list, newest edits first.
pub struct DashboardController {
    store: Arc<dyn DocumentStore>,
    runtime: Handle,
    page_size: usize,
    page: usize,
    documents: Vec<DocumentRecord>,
    total: usize,
    loading: bool,
    /// Only the newest listing request is applied
    list_seq: u64,
    error: Option<String>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl DashboardController {
    /// Creates a controller showing the first page. Nothing is loaded until
    /// [`refresh`](Self::refresh).
    pub fn new(store: Arc<dyn DocumentStore>, runtime: Handle, page_size: usize) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            store,
            runtime,
            page_size: page_size.max(1),
            page: 0,
            documents: Vec::new(),
            total: 0,
            loading: false,
            list_seq: 0,
            error: None,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Documents on the current page.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    /// Total number of stored documents.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Zero-based page index.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Whether a listing is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Most recent failure message.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a later page exists.
    pub fn has_more(&self) -> bool {
        (self.page + 1) * self.page_size < self.total
    }

    /// Whether an earlier page exists.
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Reloads the current page.
    pub fn refresh(&mut self) {
        self.list_seq += 1;
        let seq = self.list_seq;
        self.loading = true;
        let store = Arc::clone(&self.store);
        let offset = self.page * self.page_size;
        let limit = self.page_size;
        self.spawn(move || match store.list_documents(offset, limit) {
            Ok(page) => Completion::Listed { seq, page },
            Err(e) => Completion::ListFailed {
                seq,
                error: e.to_string(),
            },
        });
    }

    /// Moves to the next page, if any.
    pub fn next_page(&mut self) {
        if self.has_more() {
            self.page += 1;
            self.refresh();
        }
    }

    /// Moves to the previous page, if any.
    pub fn previous_page(&mut self) {
        if self.has_previous() {
            self.page -= 1;
            self.refresh();
        }
    }

    /// Creates a new, empty document. Completion yields [`DashboardEvent::Created`].
    pub fn create(&mut self) {
        let store = Arc::clone(&self.store);
        self.spawn(move || match store.create_document(NEW_DOCUMENT_TITLE) {
            Ok(record) => Completion::Created(record),
            Err(e) => Completion::CreateFailed(e.to_string()),
        });
    }

    /// Deletes a document and its snapshots, then reloads the page.
    pub fn delete(&mut self, id: &str) {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        self.spawn(move || match store.delete_document(&id) {
            Ok(()) => Completion::Deleted(id),
            Err(e) => Completion::DeleteFailed(e.to_string()),
        });
    }

    fn spawn<F>(&mut self, call: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let _ = tx.send(call());
        });
    }

    /// Applies finished store calls without blocking.
    pub fn poll(&mut self) -> Vec<DashboardEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            events.extend(self.apply(completion));
        }
        events
    }

    /// Waits for every in-flight store call.
    pub async fn settle(&mut self) -> Vec<DashboardEvent> {
        let mut events = Vec::new();
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(completion) => events.extend(self.apply(completion)),
                None => break,
            }
        }
        events
    }

    fn apply(&mut self, completion: Completion) -> Option<DashboardEvent> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Listed { seq, page } => {
                if seq != self.list_seq {
                    return None;
                }
                self.loading = false;
                self.error = None;
                self.total = page.total;
                self.documents = page.documents;
                // The page emptied under us (e.g. its last document was deleted)
                if self.documents.is_empty() && self.page > 0 && self.total > 0 {
                    self.page = (self.total - 1) / self.page_size;
                    self.refresh();
                }
                None
            }
            Completion::ListFailed { seq, error } => {
                if seq == self.list_seq {
                    warn!("Failed to list documents: {error}");
                    self.loading = false;
                    self.error = Some(error);
                }
                None
            }
            Completion::Created(record) => {
                info!("Created document {}", record.id);
                Some(DashboardEvent::Created(record))
            }
            Completion::CreateFailed(error) => {
                warn!("Failed to create document: {error}");
                self.error = Some(error);
                None
            }
            Completion::Deleted(id) => {
                info!("Deleted document {id}");
                self.documents.retain(|doc| doc.id != id);
                self.refresh();
                Some(DashboardEvent::Deleted(id))
            }
            Completion::DeleteFailed(error) => {
                warn!("Failed to delete document: {error}");
                self.error = Some(error);
                None
            }
        }
    }
}
