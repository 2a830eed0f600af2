//! Selection state and the translation of user intents into document edits.
//!
//! The canvas reports gestures (clicks, drags, connect, keys) and the
//! [`InteractionCoordinator`] turns them into [`MindmapDocument`] operations.
//! Node widgets carry no behavior: per-node actions are [`NodeCommand`]s
//! dispatched by node id.

use crate::config::LayoutConfig;
use crate::document::MindmapDocument;
use crate::types::{CreateIntent, EdgeId, NodeId, Position};
use log::debug;

/// Keys of the editor's keyboard surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    /// Create a child of the selected node
    MakeChild,
    /// Create a sibling of the selected node
    MakeSibling,
    /// Delete the selected node and its descendants
    DeleteSubtree,
}

/// Actions a node widget can request for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Add a child below this node
    AddChild,
    /// Add a sibling below this node
    AddSibling,
    /// Replace this node's label
    Rename(String),
    /// Leave label edit mode
    FinishEditing,
}

/// Visual emphasis of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStyle {
    /// No emphasis
    Default,
    /// Touches the selected node
    Incident,
    /// Under the pointer
    Hovered,
    /// The selected edge
    Selected,
}

/// What the canvas needs to draw one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRenderData {
    /// Node id
    pub id: NodeId,
    /// Canvas position
    pub position: Position,
    /// Label text
    pub label: String,
    /// Whether this is the root node
    pub is_root: bool,
    /// Whether the node is selected
    pub selected: bool,
    /// Whether the label is being edited
    pub editing: bool,
}

/// What the canvas needs to draw one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRenderData {
    /// Edge id
    pub id: EdgeId,
    /// Parent node
    pub source: NodeId,
    /// Child node
    pub target: NodeId,
    /// Emphasis
    pub style: EdgeStyle,
}

/// Node and edge selection. A node and an edge are never selected together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    node: Option<NodeId>,
    edge: Option<EdgeId>,
    hovered_edge: Option<EdgeId>,
}

impl Selection {
    /// The selected node.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// The selected edge.
    pub fn edge(&self) -> Option<&str> {
        self.edge.as_deref()
    }

    /// The edge under the pointer.
    pub fn hovered_edge(&self) -> Option<&str> {
        self.hovered_edge.as_deref()
    }
}

/// Tracks selection and label editing, and applies user intents to a document.
#[derive(Debug, Clone, Default)]
pub struct InteractionCoordinator {
    selection: Selection,
    editing: Option<NodeId>,
    layout: LayoutConfig,
}

impl InteractionCoordinator {
    /// Creates a coordinator with nothing selected.
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Node whose label is being edited.
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Selects a node, clearing any edge selection.
    pub fn select_node(&mut self, id: Option<NodeId>) {
        self.selection.node = id;
        self.selection.edge = None;
    }

    /// Selects an edge, clearing any node selection.
    pub fn select_edge(&mut self, id: Option<EdgeId>) {
        self.selection.edge = id;
        self.selection.node = None;
    }

    /// Enters label edit mode for a node.
    pub fn begin_editing(&mut self, id: NodeId) {
        self.editing = Some(id);
    }

    /// Leaves label edit mode.
    pub fn finish_editing(&mut self) {
        self.editing = None;
    }

    /// Creates a child of the selected node, selects it and starts editing it.
    pub fn new_child(&mut self, doc: &mut MindmapDocument) -> Option<NodeId> {
        self.create(doc, CreateIntent::Child)
    }

    /// Creates a sibling of the selected node (a child, if the root is
    /// selected), selects it and starts editing it.
    pub fn new_sibling(&mut self, doc: &mut MindmapDocument) -> Option<NodeId> {
        self.create(doc, CreateIntent::Sibling)
    }

    fn create(&mut self, doc: &mut MindmapDocument, intent: CreateIntent) -> Option<NodeId> {
        let anchor = self.selection.node.clone()?;
        let created = doc.create_node(&anchor, intent, &self.layout)?;
        self.select_node(Some(created.clone()));
        self.editing = Some(created.clone());
        Some(created)
    }

    /// Deletes the selected node's subtree and selects the fallback node.
    pub fn delete_selected(&mut self, doc: &mut MindmapDocument) -> bool {
        let Some(selected) = self.selection.node.clone() else {
            return false;
        };
        let Some(outcome) = doc.delete_subtree(&selected) else {
            return false;
        };
        if self
            .editing
            .as_ref()
            .is_some_and(|id| outcome.removed.contains(id))
        {
            self.editing = None;
        }
        self.selection.hovered_edge = None;
        self.select_node(outcome.fallback);
        true
    }

    /// Handles the connect gesture `source -> target`: `target` becomes a
    /// child of `source` and is selected. Cycle-forming requests are ignored.
    pub fn connect(&mut self, doc: &mut MindmapDocument, source: &str, target: &str) -> bool {
        if !doc.reparent(target, source) {
            debug!("Connect {source} -> {target} did not apply");
            return false;
        }
        self.select_node(Some(target.to_string()));
        true
    }

    /// A click on a node selects it.
    pub fn click_node(&mut self, id: &str) {
        self.select_node(Some(id.to_string()));
    }

    /// A click on an edge selects it.
    pub fn click_edge(&mut self, id: &str) {
        self.select_edge(Some(id.to_string()));
    }

    /// Updates the hovered edge.
    pub fn hover_edge(&mut self, id: Option<&str>) {
        self.selection.hovered_edge = id.map(str::to_string);
    }

    /// A click on empty canvas clears the selection and ends editing.
    pub fn click_pane(&mut self) {
        self.selection.node = None;
        self.selection.edge = None;
        self.editing = None;
    }

    /// Moves a node to where it was dragged. Nothing is re-laid out.
    pub fn drag_node(&mut self, doc: &mut MindmapDocument, id: &str, position: Position) -> bool {
        doc.move_node(id, position)
    }

    /// Applies a key of the keyboard surface. Ignored while an IME composition
    /// is in progress, while a label is being edited, or with no node selected.
    pub fn handle_key(&mut self, doc: &mut MindmapDocument, key: EditorKey, composing: bool) -> bool {
        if composing || self.editing.is_some() || self.selection.node.is_none() {
            return false;
        }
        match key {
            EditorKey::MakeChild => self.new_child(doc).is_some(),
            EditorKey::MakeSibling => self.new_sibling(doc).is_some(),
            EditorKey::DeleteSubtree => self.delete_selected(doc),
        }
    }

    /// Runs a node widget's command against the node it came from.
    pub fn dispatch(&mut self, doc: &mut MindmapDocument, node_id: &str, command: NodeCommand) -> bool {
        if !doc.contains(node_id) {
            return false;
        }
        match command {
            NodeCommand::AddChild => {
                self.select_node(Some(node_id.to_string()));
                self.new_child(doc).is_some()
            }
            NodeCommand::AddSibling => {
                self.select_node(Some(node_id.to_string()));
                self.new_sibling(doc).is_some()
            }
            NodeCommand::Rename(label) => doc.rename_node(node_id, &label),
            NodeCommand::FinishEditing => {
                if self.editing.as_deref() == Some(node_id) {
                    self.editing = None;
                }
                true
            }
        }
    }

    /// Selects the first node and forgets everything else (after a restore).
    pub fn reset(&mut self, doc: &MindmapDocument) {
        self.editing = None;
        self.selection.hovered_edge = None;
        self.select_node(doc.nodes().first().map(|node| node.id.clone()));
    }

    /// Per-node render data.
    pub fn node_render_data(&self, doc: &MindmapDocument) -> Vec<NodeRenderData> {
        doc.nodes()
            .iter()
            .map(|node| NodeRenderData {
                id: node.id.clone(),
                position: node.position,
                label: node.label.clone(),
                is_root: doc.is_root(&node.id),
                selected: self.selection.node.as_ref() == Some(&node.id),
                editing: self.editing.as_ref() == Some(&node.id),
            })
            .collect()
    }

    /// Per-edge render data, recomputed from the current selection.
    pub fn edge_render_data(&self, doc: &MindmapDocument) -> Vec<EdgeRenderData> {
        doc.edges()
            .iter()
            .map(|edge| EdgeRenderData {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                style: self.edge_style(&edge.id, &edge.source, &edge.target),
            })
            .collect()
    }

    fn edge_style(&self, id: &str, source: &str, target: &str) -> EdgeStyle {
        if self.selection.edge.as_deref() == Some(id) {
            EdgeStyle::Selected
        } else if self.selection.hovered_edge.as_deref() == Some(id) {
            EdgeStyle::Hovered
        } else if let Some(selected) = self.selection.node.as_deref() {
            if selected == source || selected == target {
                EdgeStyle::Incident
            } else {
                EdgeStyle::Default
            }
        } else {
            EdgeStyle::Default
        }
    }
}
