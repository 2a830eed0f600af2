//! Autosave and snapshot history for one open document.
//!
//! The [`PersistenceController`] is driven by [`tick`](PersistenceController::tick),
//! called once per frame with the live document. Store calls are spawned on the
//! tokio runtime and their completions are drained on the next tick, so the
//! caller never blocks on I/O.
//!
//! Timers are plain deadlines owned by the controller:
//!
//! - the debounce deadline is pushed out on every document revision change and
//!   fires an autosave once it passes;
//! - the snapshot deadline fires every interval and takes a snapshot only when a
//!   save has completed since the last snapshot and no snapshot is in flight.
//!
//! Document writes carry a sequence number and pass through a shared write gate,
//! so an older write that finishes late is dropped instead of overwriting a
//! newer one.

use crate::config::PersistenceConfig;
use crate::document::MindmapDocument;
use crate::store::{DocumentStore, SnapshotRecord};
use crate::types::{DocJson, SaveStatus};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Completion of a spawned store call.
#[derive(Debug)]
enum Completion {
    Saved {
        seq: u64,
        doc: DocJson,
        at: DateTime<Utc>,
    },
    SaveFailed {
        seq: u64,
        error: String,
    },
    SaveSuperseded {
        seq: u64,
    },
    SnapshotCreated {
        record: SnapshotRecord,
        generation: u64,
    },
    SnapshotFailed(String),
    SnapshotsListed(Vec<SnapshotRecord>),
    SnapshotListFailed(String),
    TitleSaved(String),
    TitleSaveFailed(String),
}

/// Debounced autosave, explicit save and snapshot history for one document.
pub struct PersistenceController {
    document_id: String,
    store: Arc<dyn DocumentStore>,
    runtime: Handle,
    config: PersistenceConfig,

    status: SaveStatus,
    last_saved_at: Option<DateTime<Utc>>,
    /// Payload of the newest successful write (or the payload read at open)
    last_saved: Option<DocJson>,
    last_saved_seq: u64,
    /// Newest issued write that has not completed yet
    pending_save: Option<(u64, DocJson)>,
    save_seq: u64,
    /// Sequence number of the newest write that reached the store
    write_gate: Arc<Mutex<u64>>,

    observed_revision: Option<u64>,
    debounce_deadline: Option<Instant>,

    /// Set by successful saves, cleared by snapshots
    dirty: bool,
    saves_completed: u64,
    snapshot_busy: bool,
    next_snapshot_at: Option<Instant>,
    snapshots: Vec<SnapshotRecord>,
    snapshots_loading: bool,

    last_error: Option<String>,
    running: bool,

    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl PersistenceController {
    /// Creates a stopped controller. `baseline` is the payload the store held
    /// when the document was opened; autosave skips writes equal to it.
    pub fn new(
        document_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        runtime: Handle,
        config: PersistenceConfig,
        baseline: Option<DocJson>,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            document_id: document_id.into(),
            store,
            runtime,
            config,
            status: SaveStatus::Idle,
            last_saved_at: None,
            last_saved: baseline,
            last_saved_seq: 0,
            pending_save: None,
            save_seq: 0,
            write_gate: Arc::new(Mutex::new(0)),
            observed_revision: None,
            debounce_deadline: None,
            dirty: false,
            saves_completed: 0,
            snapshot_busy: false,
            next_snapshot_at: None,
            snapshots: Vec::new(),
            snapshots_loading: false,
            last_error: None,
            running: false,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Arms the snapshot timer and starts reacting to document changes.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.next_snapshot_at = Some(now + self.config.snapshot_interval());
        info!("Persistence started for document {}", self.document_id);
    }

    /// Disarms every timer. In-flight writes still complete and are applied.
    pub fn stop(&mut self) {
        if self.running {
            info!("Persistence stopped for document {}", self.document_id);
        }
        self.running = false;
        self.debounce_deadline = None;
        self.next_snapshot_at = None;
    }

    /// Flushes a pending debounced save (including edits no tick has seen
    /// yet), then stops.
    pub fn close(&mut self, doc: &MindmapDocument) {
        if self.running {
            self.observe(doc.revision(), Instant::now());
            if self.debounce_deadline.is_some() {
                self.autosave(doc);
            }
        }
        self.stop();
    }

    /// Applies finished store calls and fires any timer whose deadline passed.
    pub fn tick(&mut self, doc: &MindmapDocument, now: Instant) {
        self.poll();
        if !self.running {
            return;
        }
        self.observe(doc.revision(), now);

        if self.debounce_deadline.is_some_and(|deadline| now >= deadline) {
            self.debounce_deadline = None;
            self.autosave(doc);
        }

        if self.next_snapshot_at.is_some_and(|deadline| now >= deadline) {
            self.next_snapshot_at = Some(now + self.config.snapshot_interval());
            self.auto_snapshot(doc);
        }
    }

    fn observe(&mut self, revision: u64, now: Instant) {
        match self.observed_revision {
            // The first observation is the loaded state, not an edit
            None => self.observed_revision = Some(revision),
            Some(seen) if seen == revision => {}
            Some(_) => {
                self.observed_revision = Some(revision);
                self.debounce_deadline = Some(now + self.config.autosave_debounce());
            }
        }
    }

    /// Drains completed store calls without blocking.
    pub fn poll(&mut self) {
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
        }
    }

    /// Waits until every spawned store call has completed and been applied.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    /// Writes the document unless it equals the newest saved or in-flight payload.
    /// Returns whether a write was issued.
    pub fn autosave(&mut self, doc: &MindmapDocument) -> bool {
        let payload = doc.to_doc_json();
        let baseline = self
            .pending_save
            .as_ref()
            .map(|(_, pending)| pending)
            .or(self.last_saved.as_ref());
        if baseline == Some(&payload) {
            debug!("Autosave skipped for {}: no changes", self.document_id);
            return false;
        }
        self.write(payload);
        true
    }

    /// Writes the current document immediately, cancelling a pending debounce.
    pub fn save_now(&mut self, doc: &MindmapDocument) {
        self.debounce_deadline = None;
        self.write(doc.to_doc_json());
    }

    fn write(&mut self, payload: DocJson) {
        self.save_seq += 1;
        let seq = self.save_seq;
        self.status = SaveStatus::Saving;
        self.pending_save = Some((seq, payload.clone()));

        let store = Arc::clone(&self.store);
        let gate = Arc::clone(&self.write_gate);
        let tx = self.tx.clone();
        let id = self.document_id.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let mut newest = gate.lock().await;
            if *newest > seq {
                let _ = tx.send(Completion::SaveSuperseded { seq });
                return;
            }
            let at = Utc::now();
            let completion = match store.update_document(&id, &payload, at) {
                Ok(()) => {
                    *newest = seq;
                    Completion::Saved { seq, doc: payload, at }
                }
                Err(e) => Completion::SaveFailed {
                    seq,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(completion);
        });
    }

    /// Takes a snapshot of the current document. Ignored (returns `false`)
    /// while another snapshot is in flight.
    pub fn snapshot_now(&mut self, doc: &MindmapDocument) -> bool {
        if self.snapshot_busy {
            debug!("Snapshot already in flight for {}", self.document_id);
            return false;
        }
        self.snapshot_busy = true;

        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let id = self.document_id.clone();
        let payload = doc.to_doc_json();
        let generation = self.saves_completed;
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let completion = match store.insert_snapshot(&id, &payload) {
                Ok(record) => Completion::SnapshotCreated { record, generation },
                Err(e) => Completion::SnapshotFailed(e.to_string()),
            };
            let _ = tx.send(completion);
        });
        true
    }

    fn auto_snapshot(&mut self, doc: &MindmapDocument) {
        if !self.dirty {
            debug!("Snapshot timer: {} is clean", self.document_id);
            return;
        }
        self.snapshot_now(doc);
    }

    /// Reloads the snapshot list (newest first, bounded by the configured limit).
    pub fn refresh_snapshots(&mut self) {
        self.snapshots_loading = true;
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let id = self.document_id.clone();
        let limit = self.config.snapshot_list_limit;
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let completion = match store.list_snapshots(&id, limit) {
                Ok(records) => Completion::SnapshotsListed(records),
                Err(e) => Completion::SnapshotListFailed(e.to_string()),
            };
            let _ = tx.send(completion);
        });
    }

    /// Writes a new title to the document record.
    pub fn update_title(&mut self, title: &str) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let id = self.document_id.clone();
        let title = title.to_string();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let completion = match store.update_title(&id, &title) {
                Ok(()) => Completion::TitleSaved(title),
                Err(e) => Completion::TitleSaveFailed(e.to_string()),
            };
            let _ = tx.send(completion);
        });
    }

    /// Flags the document as changed since the last snapshot.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Saved { seq, doc, at } => {
                if seq >= self.last_saved_seq {
                    self.last_saved_seq = seq;
                    self.last_saved = Some(doc);
                    self.last_saved_at = Some(at);
                }
                self.dirty = true;
                self.saves_completed += 1;
                if seq == self.save_seq {
                    self.pending_save = None;
                    self.status = SaveStatus::Saved;
                    self.last_error = None;
                }
                info!("Saved document {} (write {})", self.document_id, seq);
            }
            Completion::SaveFailed { seq, error } => {
                error!("Failed to save document {}: {}", self.document_id, error);
                if seq == self.save_seq {
                    self.pending_save = None;
                    self.status = SaveStatus::Error;
                    self.last_error = Some(error);
                }
            }
            Completion::SaveSuperseded { seq } => {
                debug!("Dropped stale write {} for {}", seq, self.document_id);
                if seq == self.save_seq {
                    self.pending_save = None;
                    self.status = SaveStatus::Saved;
                }
            }
            Completion::SnapshotCreated { record, generation } => {
                self.snapshot_busy = false;
                // A save that landed while the snapshot was in flight keeps the flag
                if generation == self.saves_completed {
                    self.dirty = false;
                }
                info!("Created snapshot {} of {}", record.id, self.document_id);
                self.snapshots.insert(0, record);
                self.snapshots.truncate(self.config.snapshot_list_limit);
            }
            Completion::SnapshotFailed(error) => {
                self.snapshot_busy = false;
                warn!("Failed to snapshot {}: {}", self.document_id, error);
                self.last_error = Some(error);
            }
            Completion::SnapshotsListed(records) => {
                self.snapshots_loading = false;
                self.snapshots = records;
            }
            Completion::SnapshotListFailed(error) => {
                self.snapshots_loading = false;
                warn!("Failed to list snapshots of {}: {}", self.document_id, error);
                self.last_error = Some(error);
            }
            Completion::TitleSaved(title) => {
                info!("Renamed document {} to {:?}", self.document_id, title);
            }
            Completion::TitleSaveFailed(error) => {
                warn!("Failed to rename document {}: {}", self.document_id, error);
                self.last_error = Some(error);
            }
        }
    }

    /// Id of the document this controller persists.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Current save status.
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// Time of the newest successful write.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Message of the most recent failure, cleared by the next successful save.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a save completed since the last snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a snapshot write is in flight.
    pub fn is_snapshot_busy(&self) -> bool {
        self.snapshot_busy
    }

    /// The known snapshots, newest first.
    pub fn snapshots(&self) -> &[SnapshotRecord] {
        &self.snapshots
    }

    /// Whether a snapshot listing is in flight.
    pub fn snapshots_loading(&self) -> bool {
        self.snapshots_loading
    }

    /// Whether timers are armed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether an edit is waiting for its debounce window or a write is in flight.
    pub fn has_unsaved_changes(&self) -> bool {
        self.debounce_deadline.is_some() || self.pending_save.is_some()
    }

    /// Whether any store call has not completed yet.
    pub fn has_work_in_flight(&self) -> bool {
        self.in_flight > 0
    }

    /// The earliest armed deadline, for scheduling the next tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.next_snapshot_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::store::MemoryStore;
    use crate::types::CreateIntent;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        doc: MindmapDocument,
        controller: PersistenceController,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let doc = MindmapDocument::from_doc_json(&record.title, &DocJson::default());
        let controller = PersistenceController::new(
            record.id,
            store.clone(),
            Handle::current(),
            PersistenceConfig::default(),
            record.doc_json,
        );
        Fixture {
            store,
            doc,
            controller,
        }
    }

    fn add_child(doc: &mut MindmapDocument) {
        let root = doc.root().id.clone();
        doc.create_node(&root, CreateIntent::Child, &LayoutConfig::default())
            .unwrap();
    }

    fn stored_doc(f: &Fixture) -> Option<DocJson> {
        f.store
            .read_document(f.controller.document_id())
            .unwrap()
            .doc_json
    }

    #[tokio::test]
    async fn test_autosave_fires_after_quiet_window() {
        let mut f = fixture();
        let t0 = Instant::now();
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);

        add_child(&mut f.doc);
        f.controller.tick(&f.doc, t0 + Duration::from_secs(1));
        f.controller.tick(&f.doc, t0 + Duration::from_secs(3));
        f.controller.settle().await;
        assert_eq!(f.store.document_writes(), 0);

        // Another edit pushes the deadline out
        add_child(&mut f.doc);
        f.controller.tick(&f.doc, t0 + Duration::from_secs(3));
        f.controller.tick(&f.doc, t0 + Duration::from_millis(5500));
        f.controller.settle().await;
        assert_eq!(f.store.document_writes(), 0);

        f.controller.tick(&f.doc, t0 + Duration::from_secs(6));
        f.controller.settle().await;
        assert_eq!(f.store.document_writes(), 1);
        assert_eq!(f.controller.status(), SaveStatus::Saved);
        assert!(f.controller.last_saved_at().is_some());
        assert_eq!(stored_doc(&f), Some(f.doc.to_doc_json()));
    }

    #[tokio::test]
    async fn test_autosave_without_changes_writes_once() {
        let mut f = fixture();
        add_child(&mut f.doc);

        assert!(f.controller.autosave(&f.doc));
        // In-flight payload already equals the document
        assert!(!f.controller.autosave(&f.doc));
        f.controller.settle().await;
        assert!(!f.controller.autosave(&f.doc));
        f.controller.settle().await;

        assert_eq!(f.store.document_writes(), 1);
    }

    #[tokio::test]
    async fn test_loaded_state_is_not_saved() {
        let mut f = fixture();
        let t0 = Instant::now();
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);
        f.controller.tick(&f.doc, t0 + Duration::from_secs(10));
        f.controller.settle().await;

        assert_eq!(f.store.document_writes(), 0);
        assert_eq!(f.controller.status(), SaveStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_baseline_and_retries() {
        let mut f = fixture();
        add_child(&mut f.doc);
        f.store.set_fail_writes(true);

        f.controller.save_now(&f.doc);
        assert_eq!(f.controller.status(), SaveStatus::Saving);
        f.controller.settle().await;
        assert_eq!(f.controller.status(), SaveStatus::Error);
        assert!(f.controller.last_error().is_some());
        assert!(!f.controller.is_dirty());

        // Baseline is still the stored payload, so the same document is retried
        f.store.set_fail_writes(false);
        assert!(f.controller.autosave(&f.doc));
        f.controller.settle().await;
        assert_eq!(f.controller.status(), SaveStatus::Saved);
        assert!(f.controller.last_error().is_none());
        assert_eq!(stored_doc(&f), Some(f.doc.to_doc_json()));
    }

    #[tokio::test]
    async fn test_save_now_bypasses_debounce() {
        let mut f = fixture();
        let t0 = Instant::now();
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);
        add_child(&mut f.doc);
        f.controller.tick(&f.doc, t0);
        assert!(f.controller.has_unsaved_changes());

        f.controller.save_now(&f.doc);
        f.controller.settle().await;
        assert_eq!(f.store.document_writes(), 1);

        // The cancelled debounce does not fire a second write
        f.controller.tick(&f.doc, t0 + Duration::from_secs(10));
        f.controller.settle().await;
        assert_eq!(f.store.document_writes(), 1);
        assert!(!f.controller.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_stale_write_is_dropped() {
        let mut f = fixture();
        *f.controller.write_gate.lock().await = 5;
        add_child(&mut f.doc);

        f.controller.save_now(&f.doc);
        f.controller.settle().await;

        assert_eq!(f.store.document_writes(), 0);
        assert_eq!(stored_doc(&f), Some(DocJson::default()));
        assert!(!f.controller.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_successive_saves_land_in_order() {
        let mut f = fixture();
        add_child(&mut f.doc);
        f.controller.save_now(&f.doc);
        add_child(&mut f.doc);
        f.controller.save_now(&f.doc);
        f.controller.settle().await;

        assert_eq!(stored_doc(&f), Some(f.doc.to_doc_json()));
        assert_eq!(f.controller.status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_snapshot_timer_requires_dirty() {
        let mut f = fixture();
        let t0 = Instant::now();
        let interval = Duration::from_secs(180);
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);

        f.controller.tick(&f.doc, t0 + interval);
        f.controller.settle().await;
        assert!(f.store.list_snapshots(f.controller.document_id(), 20).unwrap().is_empty());

        add_child(&mut f.doc);
        f.controller.save_now(&f.doc);
        f.controller.settle().await;
        assert!(f.controller.is_dirty());

        f.controller.tick(&f.doc, t0 + interval * 2);
        f.controller.settle().await;
        assert_eq!(f.store.list_snapshots(f.controller.document_id(), 20).unwrap().len(), 1);
        assert!(!f.controller.is_dirty());
        assert_eq!(f.controller.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_snapshot_is_guarded_while_busy() {
        let mut f = fixture();
        assert!(f.controller.snapshot_now(&f.doc));
        assert!(f.controller.is_snapshot_busy());
        assert!(!f.controller.snapshot_now(&f.doc));
        f.controller.settle().await;

        assert!(!f.controller.is_snapshot_busy());
        assert_eq!(f.store.list_snapshots(f.controller.document_id(), 20).unwrap().len(), 1);
        assert!(f.controller.snapshot_now(&f.doc));
        f.controller.settle().await;
        assert_eq!(f.controller.snapshots().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_snapshot_keeps_dirty() {
        let mut f = fixture();
        f.controller.mark_dirty();
        f.store.set_fail_writes(true);

        f.controller.snapshot_now(&f.doc);
        f.controller.settle().await;

        assert!(f.controller.is_dirty());
        assert!(!f.controller.is_snapshot_busy());
    }

    #[tokio::test]
    async fn test_refresh_snapshots_lists_newest_first() {
        let mut f = fixture();
        let id = f.controller.document_id().to_string();
        let older = f.store.insert_snapshot(&id, &DocJson::default()).unwrap();
        let newer = f.store.insert_snapshot(&id, &f.doc.to_doc_json()).unwrap();

        f.controller.refresh_snapshots();
        assert!(f.controller.snapshots_loading());
        f.controller.settle().await;

        assert!(!f.controller.snapshots_loading());
        let ids: Vec<&str> = f.controller.snapshots().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    #[tokio::test]
    async fn test_close_flushes_pending_edit() {
        let mut f = fixture();
        let t0 = Instant::now();
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);
        add_child(&mut f.doc);
        f.controller.tick(&f.doc, t0 + Duration::from_millis(100));

        f.controller.close(&f.doc);
        f.controller.settle().await;

        assert!(!f.controller.is_running());
        assert_eq!(f.store.document_writes(), 1);
        assert!(f.controller.next_deadline().is_none());
    }

    #[tokio::test]
    async fn test_stopped_controller_ignores_timers() {
        let mut f = fixture();
        let t0 = Instant::now();
        f.controller.start(t0);
        f.controller.tick(&f.doc, t0);
        add_child(&mut f.doc);
        f.controller.tick(&f.doc, t0);
        f.controller.stop();

        f.controller.tick(&f.doc, t0 + Duration::from_secs(600));
        f.controller.settle().await;

        assert_eq!(f.store.document_writes(), 0);
    }

    #[tokio::test]
    async fn test_title_update_reaches_store() {
        let mut f = fixture();
        f.controller.update_title("Roadmap");
        f.controller.settle().await;

        let record = f.store.read_document(f.controller.document_id()).unwrap();
        assert_eq!(record.title, "Roadmap");
    }
}
