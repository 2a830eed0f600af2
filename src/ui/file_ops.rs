//! Document loading, navigation between screens and export.
//!
//! Store reads and file dialogs run on the tokio runtime; their results come
//! back over the file-operation channel and are applied in
//! [`handle_pending_operations`](MindmapApp::handle_pending_operations).

use super::state::{FileOperationResult, MindmapApp, Screen};
use crate::dashboard::DashboardEvent;
use crate::session::EditorSession;
use crate::store::DocumentRecord;
use eframe::egui;
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

impl MindmapApp {
    /// Applies completed async work: dashboard store calls, document loads and exports.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context, for repaint requests
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        for event in self.dashboard.poll() {
            match event {
                DashboardEvent::Created(record) => self.enter_editor(record),
                DashboardEvent::Deleted(_) => {}
            }
        }

        while let Ok(result) = self.file.file_operation_receiver.try_recv() {
            match result {
                FileOperationResult::DocumentLoaded(record) => {
                    if self.screen == Screen::Loading {
                        self.enter_editor(record);
                    }
                }
                FileOperationResult::LoadFailed(message) => {
                    error!("Failed to load document: {message}");
                    self.alert = Some(format!("This mindmap could not be loaded.\n{message}"));
                    self.show_dashboard();
                }
                FileOperationResult::ExportCompleted(path) => {
                    info!("Exported mindmap to {path}");
                    self.file.status_message = Some(format!("Exported to {path}"));
                }
                FileOperationResult::OperationFailed(message) => {
                    error!("File operation failed: {message}");
                    self.file.status_message = Some(message);
                }
            }
            ctx.request_repaint();
        }
    }

    /// Reads a document from the store and opens it once the read completes.
    pub fn open_document(&mut self, id: &str) {
        self.close_session();
        self.screen = Screen::Loading;
        let store = Arc::clone(&self.services.store);
        let sender = self.file.file_operation_sender.clone();
        let id = id.to_string();
        self.services.runtime.spawn(async move {
            let result = match store.read_document(&id) {
                Ok(record) => FileOperationResult::DocumentLoaded(record),
                Err(e) => FileOperationResult::LoadFailed(e.to_string()),
            };
            let _ = sender.send(result);
        });
    }

    /// Opens an already-read document record in the editor.
    pub fn enter_editor(&mut self, record: DocumentRecord) {
        self.close_session();
        self.reset_editor_state();
        let mut session = EditorSession::from_record(
            record,
            Arc::clone(&self.services.store),
            self.services.runtime.clone(),
            &self.services.config,
        );
        session.start(Instant::now());
        self.session = Some(session);
        self.screen = Screen::Editor;
    }

    /// Closes the open document (flushing a pending autosave) and shows the library.
    pub fn show_dashboard(&mut self) {
        self.close_session();
        self.reset_editor_state();
        self.screen = Screen::Dashboard;
        self.dashboard.refresh();
    }

    /// Flushes and drops the open session, if any.
    pub fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Exports the open document as JSON through a save dialog.
    pub fn export_document(&mut self, ctx: &egui::Context) {
        let Some(session) = &self.session else {
            return;
        };
        let export = session.export();
        let json = match export.to_json() {
            Ok(json) => json,
            Err(e) => {
                self.file.status_message = Some(format!("Failed to export: {e}"));
                return;
            }
        };
        let file_name = export.file_name();
        let sender = self.file.file_operation_sender.clone();
        let ctx = ctx.clone();
        self.services.runtime.spawn(async move {
            if let Some(handle) = rfd::AsyncFileDialog::new()
                .add_filter("JSON", &["json"])
                .set_file_name(&file_name)
                .save_file()
                .await
            {
                let path = handle.path();
                let result = match std::fs::write(path, json) {
                    Ok(()) => FileOperationResult::ExportCompleted(path.display().to_string()),
                    Err(e) => FileOperationResult::OperationFailed(format!("Failed to export: {e}")),
                };
                let _ = sender.send(result);
            }
            ctx.request_repaint();
        });
    }
}
