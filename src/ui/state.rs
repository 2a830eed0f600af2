//! Application state management structures.
//!
//! This module contains the state the front end keeps between frames: which
//! screen is showing, canvas navigation, in-progress pointer gestures, pending
//! confirmations and the channel that async file work reports back on.

use crate::config::EditorConfig;
use crate::dashboard::DashboardController;
use crate::session::EditorSession;
use crate::store::{DocumentRecord, DocumentStore, SnapshotRecord};
use crate::types::NodeId;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Everything the app needs to reach the outside world.
#[derive(Clone)]
pub struct AppServices {
    /// Document store shared by the dashboard and every session
    pub store: Arc<dyn DocumentStore>,
    /// Runtime that store calls and file dialogs are spawned on
    pub runtime: Handle,
    /// Editor configuration
    pub config: EditorConfig,
}

/// UI preferences persisted through eframe storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Zoom level restored for the next session
    pub zoom_factor: f32,
    /// Whether the background grid is drawn
    pub show_grid: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            zoom_factor: 1.0,
            show_grid: true,
        }
    }
}

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The document library
    Dashboard,
    /// A document is being loaded
    Loading,
    /// The mindmap editor
    Editor,
}

/// Canvas navigation state.
pub struct CanvasState {
    /// Current canvas pan offset (in screen space)
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal)
    pub zoom_factor: f32,
    /// Whether the grid is displayed
    pub show_grid: bool,
    /// Whether the view was centered on the root for the open document
    pub centered: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            show_grid: true,
            centered: false,
        }
    }
}

/// In-progress pointer and text gestures on the canvas.
#[derive(Default)]
pub struct InteractionState {
    /// Node currently being dragged
    pub dragging_node: Option<NodeId>,
    /// Offset from the pointer to the dragged node's center
    pub node_drag_offset: egui::Vec2,
    /// Whether the user is panning the canvas
    pub is_panning: bool,
    /// Last pointer position while panning
    pub last_pan_pos: Option<egui::Pos2>,
    /// Shift-press on a node that becomes a connect gesture once dragged far enough
    pub pending_connection_from: Option<NodeId>,
    /// Screen position of that shift-press
    pub pending_connection_start: Option<egui::Pos2>,
    /// Node a connection is being drawn from
    pub drawing_connection_from: Option<NodeId>,
    /// Pointer position while drawing a connection
    pub connection_draw_pos: Option<egui::Pos2>,
    /// Node whose label buffer is loaded in `temp_label`
    pub label_edit_node: Option<NodeId>,
    /// Label being typed
    pub temp_label: String,
    /// Whether focus was already requested for the current label edit
    pub focus_requested_for_edit: bool,
    /// Whether an IME composition is in progress
    pub ime_composing: bool,
}

/// Draft of the document title while it is being edited.
#[derive(Default)]
pub struct TitleEditState {
    /// The text being typed; `None` when not editing
    pub draft: Option<String>,
    /// Whether focus was already requested for the title field
    pub focus_requested: bool,
}

/// Actions that need the user's explicit confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingConfirmAction {
    /// Replace the open document with a snapshot
    RestoreSnapshot(SnapshotRecord),
    /// Delete a document from the library
    DeleteDocument {
        /// Document id
        id: String,
        /// Title shown in the prompt
        title: String,
    },
}

/// Messages sent from async work back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// A document record was read and can be opened
    DocumentLoaded(DocumentRecord),
    /// Reading a document failed
    LoadFailed(String),
    /// Export written to the given path
    ExportCompleted(String),
    /// Export failed with an error message
    OperationFailed(String),
}

/// Channel and status of async file work.
pub struct FileState {
    /// Sender handed to spawned tasks
    pub file_operation_sender: Sender<FileOperationResult>,
    /// Receiver drained once per frame
    pub file_operation_receiver: Receiver<FileOperationResult>,
    /// Last export outcome, shown in the status bar
    pub status_message: Option<String>,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            file_operation_sender: sender,
            file_operation_receiver: receiver,
            status_message: None,
        }
    }
}

/// The main application structure.
///
/// This struct implements the `eframe::App` trait and owns the dashboard,
/// the open editing session (if any) and all front-end state.
pub struct MindmapApp {
    /// Store, runtime and configuration
    pub services: AppServices,
    /// Which screen is showing
    pub screen: Screen,
    /// Document library controller
    pub dashboard: DashboardController,
    /// The open document
    pub session: Option<EditorSession>,
    /// Canvas navigation state
    pub canvas: CanvasState,
    /// Pointer and label gestures
    pub interaction: InteractionState,
    /// Title editing
    pub title_edit: TitleEditState,
    /// Async file work
    pub file: FileState,
    /// Whether the snapshot history drawer is open
    pub show_history: bool,
    /// Action awaiting confirmation
    pub pending_confirm: Option<PendingConfirmAction>,
    /// Blocking alert message (load failures)
    pub alert: Option<String>,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
}

impl MindmapApp {
    /// Creates the app on the dashboard screen and starts loading the first page.
    pub fn new(services: AppServices, preferences: UiPreferences) -> Self {
        let mut dashboard = DashboardController::new(
            Arc::clone(&services.store),
            services.runtime.clone(),
            services.config.persistence.dashboard_page_size,
        );
        dashboard.refresh();
        Self {
            services,
            screen: Screen::Dashboard,
            dashboard,
            session: None,
            canvas: CanvasState {
                zoom_factor: preferences.zoom_factor.clamp(0.25, 5.0),
                show_grid: preferences.show_grid,
                ..CanvasState::default()
            },
            interaction: InteractionState::default(),
            title_edit: TitleEditState::default(),
            file: FileState::default(),
            show_history: false,
            pending_confirm: None,
            alert: None,
            dark_mode: preferences.dark_mode,
        }
    }

    /// The preferences to persist.
    pub fn preferences(&self) -> UiPreferences {
        UiPreferences {
            dark_mode: self.dark_mode,
            zoom_factor: self.canvas.zoom_factor,
            show_grid: self.canvas.show_grid,
        }
    }

    /// Clears all per-document front-end state.
    pub fn reset_editor_state(&mut self) {
        self.canvas.offset = egui::Vec2::ZERO;
        self.canvas.centered = false;
        self.interaction = InteractionState::default();
        self.title_edit = TitleEditState::default();
        self.show_history = false;
        self.pending_confirm = None;
    }
}
