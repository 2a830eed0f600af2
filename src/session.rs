//! One open mindmap: the document, its selection state and its persistence,
//! wired together.

use crate::config::{EditorConfig, LayoutConfig};
use crate::document::MindmapDocument;
use crate::interaction::{EdgeRenderData, EditorKey, InteractionCoordinator, NodeCommand, NodeRenderData};
use crate::persistence::PersistenceController;
use crate::store::{DocumentRecord, DocumentStore, SnapshotRecord, StoreError};
use crate::types::{ExportedDocument, NodeId, Position};
use log::info;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;

/// An editing session over one stored document.
///
/// Every gesture goes through the session so that document edits are picked
/// up by autosave on the next [`tick`](Self::tick).
pub struct EditorSession {
    document: MindmapDocument,
    interaction: InteractionCoordinator,
    persistence: PersistenceController,
    layout: LayoutConfig,
}

impl EditorSession {
    /// Reads a document from the store and opens it.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        id: &str,
        runtime: Handle,
        config: &EditorConfig,
    ) -> Result<Self, StoreError> {
        let record = store.read_document(id)?;
        Ok(Self::from_record(record, store, runtime, config))
    }

    /// Opens an already-read document record. Stored payloads are repaired on
    /// the way in; an empty payload yields a lone root node.
    pub fn from_record(
        record: DocumentRecord,
        store: Arc<dyn DocumentStore>,
        runtime: Handle,
        config: &EditorConfig,
    ) -> Self {
        let payload = record.doc_json.clone().unwrap_or_default();
        let document = MindmapDocument::from_doc_json(record.title.clone(), &payload);
        info!(
            "Opened document {} with {} nodes",
            record.id,
            document.nodes().len()
        );
        let persistence = PersistenceController::new(
            record.id,
            store,
            runtime,
            config.persistence,
            record.doc_json,
        );
        Self {
            document,
            interaction: InteractionCoordinator::new(config.layout),
            persistence,
            layout: config.layout,
        }
    }

    /// The live document.
    pub fn document(&self) -> &MindmapDocument {
        &self.document
    }

    /// Selection and editing state.
    pub fn interaction(&self) -> &InteractionCoordinator {
        &self.interaction
    }

    /// Autosave and snapshot state.
    pub fn persistence(&self) -> &PersistenceController {
        &self.persistence
    }

    /// Id of the stored document.
    pub fn document_id(&self) -> &str {
        self.persistence.document_id()
    }

    /// Arms autosave and the snapshot timer.
    pub fn start(&mut self, now: Instant) {
        self.persistence.start(now);
    }

    /// Per-frame update: applies store completions and fires due timers.
    pub fn tick(&mut self, now: Instant) {
        self.persistence.tick(&self.document, now);
    }

    /// Flushes a pending autosave and tears down the timers.
    pub fn close(&mut self) {
        self.persistence.close(&self.document);
    }

    /// Waits for every in-flight store call.
    pub async fn settle(&mut self) {
        self.persistence.settle().await;
    }

    /// Renames the document and writes the new title. Returns the stored title.
    pub fn set_title(&mut self, title: &str) -> String {
        let stored = self.document.set_title(title).to_string();
        self.persistence.update_title(&stored);
        stored
    }

    /// See [`InteractionCoordinator::new_child`].
    pub fn new_child(&mut self) -> Option<NodeId> {
        self.interaction.new_child(&mut self.document)
    }

    /// See [`InteractionCoordinator::new_sibling`].
    pub fn new_sibling(&mut self) -> Option<NodeId> {
        self.interaction.new_sibling(&mut self.document)
    }

    /// See [`InteractionCoordinator::delete_selected`].
    pub fn delete_selected(&mut self) -> bool {
        self.interaction.delete_selected(&mut self.document)
    }

    /// See [`InteractionCoordinator::connect`].
    pub fn connect(&mut self, source: &str, target: &str) -> bool {
        self.interaction.connect(&mut self.document, source, target)
    }

    /// See [`InteractionCoordinator::drag_node`].
    pub fn drag_node(&mut self, id: &str, position: Position) -> bool {
        self.interaction.drag_node(&mut self.document, id, position)
    }

    /// See [`InteractionCoordinator::handle_key`].
    pub fn handle_key(&mut self, key: EditorKey, composing: bool) -> bool {
        self.interaction.handle_key(&mut self.document, key, composing)
    }

    /// See [`InteractionCoordinator::dispatch`].
    pub fn dispatch(&mut self, node_id: &str, command: NodeCommand) -> bool {
        self.interaction.dispatch(&mut self.document, node_id, command)
    }

    /// Puts a node's label into edit mode.
    pub fn begin_editing(&mut self, id: &str) {
        if self.document.contains(id) {
            self.interaction.begin_editing(id.to_string());
        }
    }

    /// A click on a node.
    pub fn click_node(&mut self, id: &str) {
        self.interaction.click_node(id);
    }

    /// A click on an edge.
    pub fn click_edge(&mut self, id: &str) {
        self.interaction.click_edge(id);
    }

    /// The edge under the pointer changed.
    pub fn hover_edge(&mut self, id: Option<&str>) {
        self.interaction.hover_edge(id);
    }

    /// A click on empty canvas.
    pub fn click_pane(&mut self) {
        self.interaction.click_pane();
    }

    /// Re-lays out the whole tree from the root.
    pub fn relayout(&mut self) {
        self.document.relayout(&self.layout);
    }

    /// Writes the document now.
    pub fn save_now(&mut self) {
        self.persistence.save_now(&self.document);
    }

    /// Takes a manual snapshot. Returns `false` if one is already in flight.
    pub fn snapshot_now(&mut self) -> bool {
        self.persistence.snapshot_now(&self.document)
    }

    /// Reloads the snapshot list.
    pub fn refresh_snapshots(&mut self) {
        self.persistence.refresh_snapshots();
    }

    /// Replaces the whole document with a snapshot's payload, discarding
    /// local changes. The first node is selected and the restored state is
    /// flagged for autosave and snapshotting.
    pub fn restore_snapshot(&mut self, snapshot: &SnapshotRecord) {
        self.document.replace_contents(&snapshot.doc_json);
        self.interaction.reset(&self.document);
        self.persistence.mark_dirty();
        info!(
            "Restored document {} from snapshot {}",
            self.document_id(),
            snapshot.id
        );
    }

    /// The export envelope for the current document.
    pub fn export(&self) -> ExportedDocument {
        ExportedDocument {
            title: self.document.title().to_string(),
            doc: self.document.to_doc_json(),
        }
    }

    /// Render data for every node.
    pub fn node_render_data(&self) -> Vec<NodeRenderData> {
        self.interaction.node_render_data(&self.document)
    }

    /// Render data for every edge.
    pub fn edge_render_data(&self) -> Vec<EdgeRenderData> {
        self.interaction.edge_render_data(&self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{DocEdge, DocJson, DocNode, DocNodeData, SaveStatus};
    use std::time::Duration;

    fn node(id: &str, label: &str, parent: Option<&str>) -> DocNode {
        DocNode {
            id: id.to_string(),
            position: Position::default(),
            data: DocNodeData {
                label: label.to_string(),
                parent_id: parent.map(str::to_string),
            },
        }
    }

    fn open(store: &Arc<MemoryStore>, id: &str) -> EditorSession {
        EditorSession::open(store.clone(), id, Handle::current(), &EditorConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_document_fails() {
        let store = Arc::new(MemoryStore::new());
        let result = EditorSession::open(store, "missing", Handle::current(), &EditorConfig::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_empty_document_creates_root() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();

        let session = open(&store, &record.id);

        assert_eq!(session.document().nodes().len(), 1);
        assert_eq!(session.document().root().label, "Central idea");
        assert_eq!(session.document().title(), "Plan");
    }

    #[tokio::test]
    async fn test_open_repairs_legacy_payload() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Legacy").unwrap();
        let legacy = DocJson {
            nodes: vec![node("r", "Root", None), node("a", "A", None), node("b", "B", None)],
            edges: vec![
                DocEdge {
                    id: String::new(),
                    source: "r".into(),
                    target: "a".into(),
                },
                DocEdge {
                    id: String::new(),
                    source: "r".into(),
                    target: "b".into(),
                },
                DocEdge {
                    id: String::new(),
                    source: "a".into(),
                    target: "b".into(),
                },
            ],
        };
        store
            .update_document(&record.id, &legacy, chrono::Utc::now())
            .unwrap();

        let session = open(&store, &record.id);

        let doc = session.document();
        assert_eq!(doc.validate(), Ok(()));
        assert_eq!(doc.parent_of("a"), Some("r"));
        assert_eq!(doc.parent_of("b"), Some("r"));
        assert_eq!(doc.edges().len(), 2);
    }

    #[tokio::test]
    async fn test_edits_are_autosaved() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let mut session = open(&store, &record.id);
        let t0 = Instant::now();
        session.start(t0);
        session.tick(t0);

        let root = session.document().root().id.clone();
        session.click_node(&root);
        let child = session.new_child().unwrap();
        session.dispatch(&child, NodeCommand::Rename("Goals".into()));
        session.tick(t0 + Duration::from_millis(10));
        session.tick(t0 + Duration::from_secs(4));
        session.settle().await;

        assert_eq!(session.persistence().status(), SaveStatus::Saved);
        let stored = store.read_document(&record.id).unwrap().doc_json.unwrap();
        assert_eq!(stored, session.document().to_doc_json());
        assert!(stored.nodes.iter().any(|n| n.data.label == "Goals"));
    }

    #[tokio::test]
    async fn test_restore_overwrites_local_changes() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let mut session = open(&store, &record.id);
        let root = session.document().root().id.clone();
        session.click_node(&root);
        session.new_child();
        session.snapshot_now();
        session.settle().await;
        let snapshot = session.persistence().snapshots()[0].clone();

        // Unsaved work after the snapshot
        session.click_node(&root);
        session.new_child();
        session.new_child();
        assert_eq!(session.document().nodes().len(), 4);

        session.restore_snapshot(&snapshot);

        assert_eq!(session.document().to_doc_json(), snapshot.doc_json);
        assert_eq!(session.interaction().selection().node(), Some(root.as_str()));
        assert!(session.persistence().is_dirty());
    }

    #[tokio::test]
    async fn test_restore_is_autosaved() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let mut session = open(&store, &record.id);
        let t0 = Instant::now();
        session.start(t0);
        session.tick(t0);
        let snapshot = store
            .insert_snapshot(
                &record.id,
                &DocJson {
                    nodes: vec![node("r", "Restored", None)],
                    edges: Vec::new(),
                },
            )
            .unwrap();

        session.restore_snapshot(&snapshot);
        session.tick(t0 + Duration::from_millis(1));
        session.tick(t0 + Duration::from_secs(5));
        session.settle().await;

        let stored = store.read_document(&record.id).unwrap().doc_json.unwrap();
        assert_eq!(stored.nodes[0].data.label, "Restored");
    }

    #[tokio::test]
    async fn test_set_title_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let mut session = open(&store, &record.id);

        assert_eq!(session.set_title("   "), "Untitled");
        assert_eq!(session.set_title("  Q3 goals "), "Q3 goals");
        session.settle().await;

        assert_eq!(store.read_document(&record.id).unwrap().title, "Q3 goals");
    }

    #[tokio::test]
    async fn test_export_envelope() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Q3 Goals!").unwrap();
        let session = open(&store, &record.id);

        let export = session.export();

        assert_eq!(export.file_name(), "q3_goals_.json");
        let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(value["title"], "Q3 Goals!");
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(1));
        assert!(value["edges"].as_array().is_some());
    }

    #[tokio::test]
    async fn test_close_flushes_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let record = store.create_document("Plan").unwrap();
        let mut session = open(&store, &record.id);
        let t0 = Instant::now();
        session.start(t0);
        session.tick(t0);
        let root = session.document().root().id.clone();
        session.click_node(&root);
        session.new_child();
        session.tick(t0 + Duration::from_millis(5));

        session.close();
        session.settle().await;

        assert!(!session.persistence().is_running());
        assert_eq!(store.document_writes(), 1);
    }
}
