//! Core data types for the mindmap editor.
//!
//! This module defines the node and edge records that make up a document, the
//! creation intents and save states shared across the crate, and the persisted
//! wire shape (`DocJson`) exchanged with the document store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for mindmap nodes.
pub type NodeId = String;

/// Unique identifier for edges. Always derived from the edge's endpoints.
pub type EdgeId = String;

/// Allocates a fresh node identifier.
pub fn new_node_id() -> NodeId {
    format!("node-{}", Uuid::new_v4().simple())
}

/// Derives the identifier of the edge `source -> target`.
///
/// Identical endpoints always produce the identical id, which makes
/// de-duplication and lookups idempotent.
pub fn edge_id(source: &str, target: &str) -> EdgeId {
    format!("edge-{source}-{target}")
}

/// A point on the canvas, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Position {
    /// Creates a position from its coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns this position moved by `(dx, dy)`.
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// A single labeled, positioned vertex of the mindmap.
#[derive(Debug, Clone, PartialEq)]
pub struct MindNode {
    /// Unique identifier for this node, immutable once created
    pub id: NodeId,
    /// Short text shown on the node
    pub label: String,
    /// Position on the canvas
    pub position: Position,
    /// Parent node, `None` only for the root
    pub parent_id: Option<NodeId>,
}

impl MindNode {
    /// Creates a node with a freshly allocated id.
    pub fn new(label: impl Into<String>, position: Position, parent_id: Option<NodeId>) -> Self {
        Self {
            id: new_node_id(),
            label: label.into(),
            position,
            parent_id,
        }
    }
}

/// A directed parent -> child relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Identifier derived from `(source, target)`
    pub id: EdgeId,
    /// The parent node
    pub source: NodeId,
    /// The child node
    pub target: NodeId,
}

impl Edge {
    /// Creates the edge `source -> target` with its derived id.
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            source,
            target,
        }
    }
}

/// Where a new node goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIntent {
    /// The new node becomes a child of the anchor
    Child,
    /// The new node shares the anchor's parent
    Sibling,
}

/// Process-local state of the autosave pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing has been written this session
    #[default]
    Idle,
    /// A write is in flight
    Saving,
    /// The last write succeeded
    Saved,
    /// The last write failed
    Error,
}

/// Node payload of the persisted document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocNodeData {
    /// Node label
    #[serde(default)]
    pub label: String,
    /// Parent id; absent in documents written by older schemas
    #[serde(
        rename = "parentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<NodeId>,
}

/// A node as stored in `docJson`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocNode {
    /// Node id
    pub id: NodeId,
    /// Canvas position
    #[serde(default)]
    pub position: Position,
    /// Label and optional parent
    #[serde(default)]
    pub data: DocNodeData,
}

/// An edge as stored in `docJson`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocEdge {
    /// Edge id; recomputed from the endpoints on load
    #[serde(default)]
    pub id: EdgeId,
    /// Parent node
    pub source: NodeId,
    /// Child node
    pub target: NodeId,
}

/// The persisted document payload: `{ nodes, edges }`.
///
/// Structural equality on this type is what autosave uses to skip redundant
/// writes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocJson {
    /// All nodes, root first
    #[serde(default)]
    pub nodes: Vec<DocNode>,
    /// All parent -> child edges
    #[serde(default)]
    pub edges: Vec<DocEdge>,
}

/// The export envelope: the document payload plus its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDocument {
    /// Document title
    pub title: String,
    /// Nodes and edges, flattened next to the title
    #[serde(flatten)]
    pub doc: DocJson,
}

impl ExportedDocument {
    /// Serialize the export to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// File name for this export: non-alphanumerics become `_`, lowercased.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        if stem.is_empty() {
            "mindmap.json".to_string()
        } else {
            format!("{stem}.json")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_creation() {
        let node = MindNode::new("Idea", Position::new(100.0, 200.0), None);

        assert_eq!(node.label, "Idea");
        assert_eq!(node.position, Position::new(100.0, 200.0));
        assert!(node.id.starts_with("node-"));
        assert!(node.parent_id.is_none());
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = MindNode::new("a", Position::default(), None);
        let b = MindNode::new("b", Position::default(), None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_edge_id_is_derived_from_endpoints() {
        let edge = Edge::new("a", "b");
        assert_eq!(edge.id, "edge-a-b");
        assert_eq!(edge, Edge::new("a".to_string(), "b".to_string()));
        assert_ne!(edge.id, Edge::new("b", "a").id);
    }

    #[test]
    fn test_doc_json_wire_shape() {
        let doc = DocJson {
            nodes: vec![
                DocNode {
                    id: "root".into(),
                    position: Position::new(0.0, 0.0),
                    data: DocNodeData {
                        label: "Root".into(),
                        parent_id: None,
                    },
                },
                DocNode {
                    id: "a".into(),
                    position: Position::new(240.0, 0.0),
                    data: DocNodeData {
                        label: "A".into(),
                        parent_id: Some("root".into()),
                    },
                },
            ],
            edges: vec![DocEdge {
                id: "edge-root-a".into(),
                source: "root".into(),
                target: "a".into(),
            }],
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "nodes": [
                    {"id": "root", "position": {"x": 0.0, "y": 0.0}, "data": {"label": "Root"}},
                    {"id": "a", "position": {"x": 240.0, "y": 0.0}, "data": {"label": "A", "parentId": "root"}}
                ],
                "edges": [{"id": "edge-root-a", "source": "root", "target": "a"}]
            })
        );
    }

    #[test]
    fn test_doc_json_accepts_older_schema() {
        let doc: DocJson = serde_json::from_str(
            r#"{"nodes": [{"id": "n1", "position": {"x": 1, "y": 2}, "data": {"label": "x"}}]}"#,
        )
        .unwrap();

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].position, Position::new(1.0, 2.0));
        assert!(doc.nodes[0].data.parent_id.is_none());
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn test_export_flattens_title_next_to_nodes() {
        let export = ExportedDocument {
            title: "My Plan!".into(),
            doc: DocJson::default(),
        };

        let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"title": "My Plan!", "nodes": [], "edges": []}));
        assert_eq!(export.file_name(), "my_plan_.json");
    }

    #[test]
    fn test_export_file_name_fallback() {
        let export = ExportedDocument {
            title: String::new(),
            doc: DocJson::default(),
        };
        assert_eq!(export.file_name(), "mindmap.json");
    }
}
