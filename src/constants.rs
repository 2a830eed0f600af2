//! Shared application-wide constants.
//! Centralizes tweakable values used across layout, persistence and rendering.

// Layout
/// Horizontal distance between a parent column and its children in a full relayout.
pub const HORIZONTAL_SPACING: f32 = 280.0;
/// Vertical distance between consecutive children in a full relayout.
pub const VERTICAL_SPACING: f32 = 100.0;
/// Horizontal distance between a parent and the column of a freshly inserted node.
pub const INSERT_COLUMN_OFFSET: f32 = 240.0;
/// Vertical gap used when redistributing a sibling group after an insertion.
pub const SIBLING_GAP: f32 = 120.0;

// Labels
/// Label given to the implicit root of a document opened without content.
pub const ROOT_LABEL: &str = "Central idea";
/// Label given to nodes created through the child/sibling intents.
pub const NEW_NODE_LABEL: &str = "New node";
/// Label stored when a rename is submitted with only whitespace.
pub const EMPTY_LABEL_PLACEHOLDER: &str = "Untitled node";
/// Title given to documents created from the dashboard.
pub const NEW_DOCUMENT_TITLE: &str = "New mindmap";
/// Title stored when a title edit is submitted with only whitespace.
pub const EMPTY_TITLE_PLACEHOLDER: &str = "Untitled";

// Persistence
/// Inactivity window before a mutated document is written back.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 3000;
/// Period of the automatic snapshot timer.
pub const SNAPSHOT_INTERVAL_SECS: u64 = 180;
/// Number of snapshots fetched for the history drawer.
pub const SNAPSHOT_LIST_LIMIT: usize = 20;
/// Number of documents per dashboard page.
pub const DASHBOARD_PAGE_SIZE: usize = 9;

// Node rendering
/// Node width in world units.
pub const NODE_WIDTH: f32 = 170.0;
/// Node height in world units.
pub const NODE_HEIGHT: f32 = 44.0;
/// Corner radius for node rectangles (in screen pixels after transform).
pub const NODE_CORNER_RADIUS: f32 = 8.0;

// Canvas interactions
/// Distance in world units within which a click counts as hitting an edge.
pub const EDGE_HIT_DISTANCE: f32 = 6.0;
/// Drag distance in world units before a shift-press turns into a connect gesture.
pub const CLICK_THRESHOLD: f32 = 10.0;
/// Spacing between background grid dots in world units.
pub const GRID_SIZE: f32 = 24.0;
