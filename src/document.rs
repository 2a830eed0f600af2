//! The mindmap document model.
//!
//! A [`MindmapDocument`] owns the node and edge collections of one mindmap and
//! is the only place they are mutated. Every operation either applies fully
//! or leaves the document untouched, so the structural invariants hold after
//! each call:
//!
//! - the first node is the root and has no parent;
//! - every other node has exactly one incoming edge, mirrored by its `parent_id`;
//! - no edge references a missing node;
//! - following parents from any node reaches the root (no cycles).
//!
//! Structural no-ops (unknown ids, cycle-forming reparents, deleting the root)
//! are reported through `bool`/`Option` returns and never as errors.

use crate::config::LayoutConfig;
use crate::constants::{EMPTY_LABEL_PLACEHOLDER, EMPTY_TITLE_PLACEHOLDER, NEW_NODE_LABEL, ROOT_LABEL};
use crate::cycle_guard;
use crate::layout::{self, SiblingSlot};
use crate::types::*;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// A violated structural invariant, reported by [`MindmapDocument::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The document has no nodes at all
    #[error("document has no root node")]
    MissingRoot,
    /// The root node has a parent or an incoming edge
    #[error("root node {0} has a parent")]
    RootHasParent(NodeId),
    /// An edge references a node that does not exist
    #[error("edge {0} references a missing node")]
    DanglingEdge(EdgeId),
    /// A node has more than one incoming edge
    #[error("node {0} has more than one incoming edge")]
    MultipleParents(NodeId),
    /// A node's `parent_id` disagrees with its incoming edge
    #[error("node {0} parent does not match its incoming edge")]
    ParentMismatch(NodeId),
    /// Following parents from a node loops without reaching the root
    #[error("node {0} sits on a parent cycle")]
    Cycle(NodeId),
    /// A non-root node has no parent
    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),
}

/// Result of a successful subtree deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Every node removed, starting with the subtree root, in breadth-first order
    pub removed: Vec<NodeId>,
    /// Deterministic replacement selection: the first remaining node
    pub fallback: Option<NodeId>,
}

/// The in-memory node/edge collection of one mindmap.
#[derive(Debug, Clone, PartialEq)]
pub struct MindmapDocument {
    /// Document title (persisted separately from the node/edge payload)
    title: String,
    /// All nodes; the first one is the root
    nodes: Vec<MindNode>,
    /// All parent -> child edges
    edges: Vec<Edge>,
    /// Node id -> index in `nodes`
    index: HashMap<NodeId, usize>,
    /// Node id -> child ids, in node order
    children: HashMap<NodeId, Vec<NodeId>>,
    /// Bumped by every mutation that changes the persisted payload
    revision: u64,
}

impl Default for MindmapDocument {
    fn default() -> Self {
        Self::new(EMPTY_TITLE_PLACEHOLDER)
    }
}

impl MindmapDocument {
    /// Creates a document holding only a root node at the origin.
    pub fn new(title: impl Into<String>) -> Self {
        let root = MindNode::new(ROOT_LABEL, Position::default(), None);
        Self::from_parts(title.into(), vec![root], Vec::new())
    }

    /// Builds a document from a stored payload, repairing it with
    /// [`normalize_incoming`](Self::normalize_incoming). An empty payload yields
    /// a fresh root.
    pub fn from_doc_json(title: impl Into<String>, doc: &DocJson) -> Self {
        let title = title.into();
        if doc.nodes.is_empty() {
            return Self::new(title);
        }
        let (nodes, edges) = Self::normalize_incoming(&doc.nodes, &doc.edges);
        Self::from_parts(title, nodes, edges)
    }

    fn from_parts(title: String, nodes: Vec<MindNode>, edges: Vec<Edge>) -> Self {
        let mut document = Self {
            title,
            nodes,
            edges,
            index: HashMap::new(),
            children: HashMap::new(),
            revision: 0,
        };
        document.reindex();
        document
    }

    /// Serializes the nodes and edges into the persisted wire shape.
    pub fn to_doc_json(&self) -> DocJson {
        DocJson {
            nodes: self
                .nodes
                .iter()
                .map(|node| DocNode {
                    id: node.id.clone(),
                    position: node.position,
                    data: DocNodeData {
                        label: node.label.clone(),
                        parent_id: node.parent_id.clone(),
                    },
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| DocEdge {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                })
                .collect(),
        }
    }

    /// Reconciles a raw stored payload into a well-formed node and edge set.
    ///
    /// The first node is the root. Edges are taken in their stored order and
    /// the first edge reaching a node wins; later edges into the same node are
    /// dropped, as are edges with unknown endpoints, edges into the root and
    /// edges that would close a cycle. Nodes whose stored `parentId` has no
    /// matching edge get one synthesized; nodes still without a parent are
    /// attached under the root. Finally every node's `parent_id` mirrors its
    /// incoming edge and edge ids are recomputed from their endpoints.
    pub fn normalize_incoming(raw_nodes: &[DocNode], raw_edges: &[DocEdge]) -> (Vec<MindNode>, Vec<Edge>) {
        let mut seen = HashSet::new();
        let mut nodes: Vec<MindNode> = Vec::with_capacity(raw_nodes.len());
        for raw in raw_nodes {
            if !seen.insert(raw.id.as_str()) {
                debug!("Dropping duplicate node {}", raw.id);
                continue;
            }
            nodes.push(MindNode {
                id: raw.id.clone(),
                label: raw.data.label.clone(),
                position: raw.position,
                parent_id: raw.data.parent_id.clone(),
            });
        }
        let Some(root_id) = nodes.first().map(|node| node.id.clone()) else {
            return (Vec::new(), Vec::new());
        };

        // target -> source, first edge wins
        let mut parent_of: HashMap<String, String> = HashMap::new();
        let accept = |parent_of: &mut HashMap<String, String>, source: &str, target: &str| -> bool {
            if target == root_id
                || !seen.contains(source)
                || !seen.contains(target)
                || parent_of.contains_key(target)
            {
                return false;
            }
            let closes_cycle =
                cycle_guard::is_ancestor(target, source, |id| parent_of.get(id).map(String::as_str));
            if closes_cycle {
                return false;
            }
            parent_of.insert(target.to_string(), source.to_string());
            true
        };

        for raw in raw_edges {
            if !accept(&mut parent_of, raw.source.as_str(), raw.target.as_str()) {
                debug!("Dropping edge {} -> {} during normalization", raw.source, raw.target);
            }
        }
        // Older payloads may carry only parentId
        for node in &nodes {
            if let Some(parent) = node.parent_id.as_deref() {
                accept(&mut parent_of, parent, node.id.as_str());
            }
        }
        for node in nodes.iter().skip(1) {
            if !parent_of.contains_key(&node.id) {
                debug!("Attaching orphan {} under the root", node.id);
                parent_of.insert(node.id.clone(), root_id.clone());
            }
        }

        let mut edges = Vec::with_capacity(parent_of.len());
        let mut placed = HashSet::new();
        let mut push_edge = |edges: &mut Vec<Edge>, target: &str| {
            if let Some(source) = parent_of.get(target) {
                if placed.insert(target.to_string()) {
                    edges.push(Edge::new(source.as_str(), target));
                }
            }
        };
        // Keep stored edge order first, then the synthesized ones in node order
        for raw in raw_edges {
            if parent_of.get(&raw.target) == Some(&raw.source) {
                push_edge(&mut edges, raw.target.as_str());
            }
        }
        for node in &nodes {
            push_edge(&mut edges, node.id.as_str());
        }

        for node in &mut nodes {
            node.parent_id = parent_of.get(&node.id).cloned();
        }
        (nodes, edges)
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        self.children.clear();
        for node in &self.nodes {
            if let Some(parent) = &node.parent_id {
                self.children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        debug_assert_eq!(self.validate(), Ok(()));
    }

    /// The document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the title; whitespace-only input stores a placeholder. Returns the stored title.
    pub fn set_title(&mut self, title: &str) -> &str {
        let trimmed = title.trim();
        self.title = if trimmed.is_empty() {
            EMPTY_TITLE_PLACEHOLDER.to_string()
        } else {
            trimmed.to_string()
        };
        &self.title
    }

    /// Counter bumped by every payload mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[MindNode] {
        &self.nodes
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The root node.
    pub fn root(&self) -> &MindNode {
        &self.nodes[0]
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&MindNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Looks up an edge by id.
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    /// Whether the node exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether `id` is the root node.
    pub fn is_root(&self, id: &str) -> bool {
        self.root().id == id
    }

    /// The parent of `id`, if any.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.node(id).and_then(|node| node.parent_id.as_deref())
    }

    /// The children of `id`, top to bottom by current position (ties in creation order).
    pub fn children_of(&self, id: &str) -> Vec<&MindNode> {
        let mut children: Vec<&MindNode> = self
            .children
            .get(id)
            .map(|ids| ids.iter().filter_map(|child| self.node(child)).collect())
            .unwrap_or_default();
        children.sort_by(|a, b| a.position.y.total_cmp(&b.position.y));
        children
    }

    /// Whether `ancestor` is `descendant` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        cycle_guard::is_ancestor(ancestor, descendant, |id| self.parent_of(id))
    }

    /// `root_id` and all of its transitive children, breadth-first.
    pub fn subtree(&self, root_id: &str) -> Vec<NodeId> {
        let mut closure = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root_id.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(children) = self.children.get(&current) {
                queue.extend(children.iter().cloned());
            }
            closure.push(current);
        }
        closure
    }

    /// Creates a node next to `anchor_id` and returns its id.
    ///
    /// With [`CreateIntent::Child`] the anchor becomes the parent; with
    /// [`CreateIntent::Sibling`] the anchor's parent does. A sibling request on
    /// the root is treated as a child request. Only the receiving sibling group
    /// is re-laid out. Returns `None` if the anchor does not exist.
    pub fn create_node(
        &mut self,
        anchor_id: &str,
        intent: CreateIntent,
        config: &LayoutConfig,
    ) -> Option<NodeId> {
        let Some(anchor) = self.node(anchor_id) else {
            debug!("Ignoring create request for unknown anchor {anchor_id}");
            return None;
        };
        let (parent_id, slot_anchor) = match (intent, anchor.parent_id.as_deref()) {
            (CreateIntent::Sibling, Some(parent)) => (parent.to_string(), Some(anchor.id.clone())),
            _ => (anchor.id.clone(), None),
        };
        let parent_position = self.node(&parent_id)?.position;

        let node = MindNode::new(NEW_NODE_LABEL, parent_position, Some(parent_id.clone()));
        let new_id = node.id.clone();

        let siblings: Vec<(&str, Position)> = self
            .children
            .get(&parent_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.node(id).map(|n| (n.id.as_str(), n.position)))
            .collect();
        let slot = match slot_anchor.as_deref() {
            Some(anchor) => SiblingSlot::After(anchor),
            None => SiblingSlot::Last,
        };
        let placed =
            layout::insert_into_sibling_group(parent_position, &siblings, &new_id, slot, config);

        self.nodes.push(node);
        self.edges.push(Edge::new(parent_id.as_str(), new_id.as_str()));
        self.reindex();

        for (id, target) in placed {
            let Some(current) = self.node(&id).map(|n| n.position) else {
                continue;
            };
            let (dx, dy) = (target.x - current.x, target.y - current.y);
            if dx != 0.0 || dy != 0.0 {
                self.translate_subtree(&id, dx, dy);
            }
        }

        self.touch();
        Some(new_id)
    }

    fn translate_subtree(&mut self, root_id: &str, dx: f32, dy: f32) {
        for id in self.subtree(root_id) {
            if let Some(&i) = self.index.get(&id) {
                let node = &mut self.nodes[i];
                node.position = node.position.offset(dx, dy);
            }
        }
    }

    /// Renames a node. Surrounding whitespace is dropped and whitespace-only
    /// input stores a placeholder label. Returns `false` if the node does not exist.
    pub fn rename_node(&mut self, id: &str, label: &str) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        let trimmed = label.trim();
        let next = if trimmed.is_empty() {
            EMPTY_LABEL_PLACEHOLDER
        } else {
            trimmed
        };
        if self.nodes[i].label == next {
            return true;
        }
        self.nodes[i].label = next.to_string();
        self.touch();
        true
    }

    /// Moves a single node; descendants stay where they are.
    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        if self.nodes[i].position == position {
            return true;
        }
        self.nodes[i].position = position;
        self.touch();
        true
    }

    /// Makes `child_id` a child of `new_parent_id`, replacing its incoming edge.
    ///
    /// Returns `true` if the tree now has that shape. Rejected (and `false`)
    /// when either node is unknown, `child_id` is the root, the two are the same
    /// node, or `new_parent_id` lies inside the subtree of `child_id`.
    pub fn reparent(&mut self, child_id: &str, new_parent_id: &str) -> bool {
        if !self.contains(child_id) || !self.contains(new_parent_id) || self.is_root(child_id) {
            debug!("Ignoring reparent {child_id} -> {new_parent_id}: unknown node or root");
            return false;
        }
        if !cycle_guard::can_attach(new_parent_id, child_id, |id| self.parent_of(id)) {
            debug!("Ignoring reparent {child_id} -> {new_parent_id}: would create a cycle");
            return false;
        }
        if self.parent_of(child_id) == Some(new_parent_id) {
            return true;
        }

        self.edges.retain(|edge| edge.target != child_id);
        self.edges.push(Edge::new(new_parent_id, child_id));
        if let Some(&i) = self.index.get(child_id) {
            self.nodes[i].parent_id = Some(new_parent_id.to_string());
        }
        self.reindex();
        self.touch();
        true
    }

    /// Deletes `root_id` and all of its descendants together with every edge
    /// touching them. The root cannot be deleted.
    pub fn delete_subtree(&mut self, root_id: &str) -> Option<DeleteOutcome> {
        if !self.contains(root_id) || self.is_root(root_id) {
            debug!("Ignoring delete of {root_id}: unknown node or root");
            return None;
        }
        let removed = self.subtree(root_id);
        let doomed: HashSet<&str> = removed.iter().map(String::as_str).collect();

        self.nodes.retain(|node| !doomed.contains(node.id.as_str()));
        self.edges.retain(|edge| {
            !doomed.contains(edge.source.as_str()) && !doomed.contains(edge.target.as_str())
        });
        self.reindex();
        self.touch();

        let fallback = self.nodes.first().map(|node| node.id.clone());
        Some(DeleteOutcome { removed, fallback })
    }

    /// Re-lays out the whole tree from the root's current position.
    pub fn relayout(&mut self, config: &LayoutConfig) {
        let root = self.root();
        let placed = layout::full_layout(
            root.id.as_str(),
            root.position,
            |id| self.children_of(id).into_iter().map(|n| n.id.as_str()).collect(),
            config,
        );
        let mut changed = false;
        for (id, position) in placed {
            if let Some(&i) = self.index.get(&id) {
                if self.nodes[i].position != position {
                    self.nodes[i].position = position;
                    changed = true;
                }
            }
        }
        if changed {
            self.touch();
        }
    }

    /// Replaces every node and edge with a stored payload (snapshot restore).
    /// The title is kept.
    pub fn replace_contents(&mut self, doc: &DocJson) {
        let revision = self.revision;
        *self = Self::from_doc_json(std::mem::take(&mut self.title), doc);
        self.revision = revision;
        self.touch();
    }

    /// Checks every structural invariant.
    pub fn validate(&self) -> Result<(), StructureError> {
        let root = self.nodes.first().ok_or(StructureError::MissingRoot)?;
        if root.parent_id.is_some() {
            return Err(StructureError::RootHasParent(root.id.clone()));
        }

        let mut incoming: HashMap<&str, &str> = HashMap::new();
        for edge in &self.edges {
            if !self.contains(&edge.source) || !self.contains(&edge.target) {
                return Err(StructureError::DanglingEdge(edge.id.clone()));
            }
            if edge.target == root.id {
                return Err(StructureError::RootHasParent(root.id.clone()));
            }
            if incoming.insert(&edge.target, &edge.source).is_some() {
                return Err(StructureError::MultipleParents(edge.target.clone()));
            }
        }

        for node in self.nodes.iter().skip(1) {
            match (incoming.get(node.id.as_str()), node.parent_id.as_deref()) {
                (None, _) => return Err(StructureError::Unreachable(node.id.clone())),
                (Some(source), Some(parent)) if *source == parent => {}
                _ => return Err(StructureError::ParentMismatch(node.id.clone())),
            }
            if !self.is_ancestor(&root.id, &node.id) {
                return Err(StructureError::Cycle(node.id.clone()));
            }
        }
        Ok(())
    }
}
