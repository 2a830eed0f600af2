//! # Mindmap Editor
//!
//! A desktop mindmap editor. Every mindmap is a single rooted tree of labeled
//! nodes that the user grows with the keyboard and rearranges by dragging.
//!
//! ## Features
//! - Tab adds a child, Enter adds a sibling, Delete removes a subtree
//! - Shift-drag from one node onto another to reparent it (cycles are refused)
//! - Automatic tree layout, with a tidy action for the whole map
//! - Debounced autosave, periodic and manual snapshots, snapshot restore
//! - A document library with paging, create and delete
//! - JSON export
//!
//! The core (document model, layout, persistence and interaction) has no UI
//! dependency and is driven by tests; [`run_app`] wires it to an egui front end.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod cycle_guard;
pub mod dashboard;
pub mod document;
pub mod interaction;
pub mod layout;
pub mod persistence;
pub mod session;
pub mod store;
pub mod types;
mod ui;

pub use ui::{AppServices, MindmapApp, UiPreferences};

/// Runs the editor window until it is closed.
///
/// UI preferences are restored from eframe storage. When `open` names a
/// document, it is loaded straight away instead of showing the library.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an `eframe::Error` if
/// initialization fails.
///
/// # Example
///
/// ```no_run
/// use mindmap_editor::config::EditorConfig;
/// use mindmap_editor::store::FileStore;
/// use mindmap_editor::{run_app, AppServices};
/// use std::sync::Arc;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runtime = tokio::runtime::Runtime::new()?;
///     let config = EditorConfig::default();
///     let store = Arc::new(FileStore::open(&config.store_dir)?);
///     let services = AppServices { store, runtime: runtime.handle().clone(), config };
///     run_app(services, None)?;
///     Ok(())
/// }
/// ```
pub fn run_app(services: AppServices, open: Option<String>) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Mindmap")
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Mindmap Editor",
        options,
        Box::new(move |cc| {
            let preferences = cc
                .storage
                .and_then(|storage| storage.get_string(ui::PREFERENCES_KEY))
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or_default();
            let mut app = MindmapApp::new(services, preferences);
            if let Some(id) = open {
                app.open_document(&id);
            }
            Ok(Box::new(app))
        }),
    )
}
