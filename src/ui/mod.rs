//! User interface components and rendering logic for the mindmap editor.
//!
//! This module contains the eframe application, the editor's toolbar and
//! keyboard handling, and the inline label editor.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main MindmapApp
//! - `file_ops` - Document loading, screen changes and export
//! - `canvas` - Canvas navigation, zooming, panning, and interaction
//! - `rendering` - Drawing nodes, edges and the grid
//! - `panels` - The document library, snapshot history and dialogs

mod canvas;
mod file_ops;
mod panels;
mod rendering;
mod state;

pub use state::{AppServices, MindmapApp, UiPreferences};

use self::state::Screen;
use crate::interaction::{EditorKey, NodeCommand};
use crate::types::SaveStatus;
use eframe::egui;
use log::error;
use std::time::Instant;

/// Key under which UI preferences are kept in eframe storage.
pub const PREFERENCES_KEY: &str = "ui_prefs";

impl eframe::App for MindmapApp {
    /// Persist UI preferences between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match serde_json::to_string(&self.preferences()) {
            Ok(json) => storage.set_string(PREFERENCES_KEY, json),
            Err(err) => error!("Failed to serialize preferences: {err}"),
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show(ctx);
    }
}

impl MindmapApp {
    /// Draws one frame of whichever screen is active.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context
    pub fn show(&mut self, ctx: &egui::Context) {
        let visuals = if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        self.handle_pending_operations(ctx);

        // Flush the open document before the window goes away
        if ctx.input(|i| i.viewport().close_requested()) {
            self.close_session();
        }

        match self.screen {
            Screen::Dashboard => self.draw_dashboard(ctx),
            Screen::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                });
            }
            Screen::Editor => self.draw_editor(ctx),
        }

        self.draw_confirm_dialog(ctx);
        self.draw_alert(ctx);
        self.schedule_repaint(ctx);
    }

    fn draw_editor(&mut self, ctx: &egui::Context) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.tick(Instant::now());

        self.handle_editor_keys(ctx);

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        if self.show_history {
            egui::SidePanel::right("history_panel")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    self.draw_history_panel(ui);
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.draw_canvas(ui);
            });

        self.draw_label_editor(ctx);
    }

    /// Wakes the UI for the next autosave or snapshot deadline, and while
    /// store calls are outstanding.
    fn schedule_repaint(&self, ctx: &egui::Context) {
        let busy = self.dashboard.is_loading()
            || self.screen == Screen::Loading
            || self
                .session
                .as_ref()
                .is_some_and(|s| s.persistence().has_work_in_flight());
        if busy {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
            return;
        }
        if let Some(deadline) = self.session.as_ref().and_then(|s| s.persistence().next_deadline()) {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
    }

    /// Tab adds a child, Enter adds a sibling, Delete/Backspace removes the
    /// selected subtree. Keys belong to the text field while one has focus,
    /// and are ignored while an IME composition is active.
    fn handle_editor_keys(&mut self, ctx: &egui::Context) {
        ctx.input(|i| {
            for event in &i.events {
                if let egui::Event::Ime(ime) = event {
                    match ime {
                        egui::ImeEvent::Preedit(text) => {
                            self.interaction.ime_composing = !text.is_empty();
                        }
                        egui::ImeEvent::Commit(_) | egui::ImeEvent::Disabled => {
                            self.interaction.ime_composing = false;
                        }
                        _ => {}
                    }
                }
            }
        });

        if ctx.wants_keyboard_input() {
            return;
        }

        let (save, key) = ctx.input_mut(|i| {
            let save = i.consume_key(egui::Modifiers::COMMAND, egui::Key::S);
            let key = if i.consume_key(egui::Modifiers::NONE, egui::Key::Tab) {
                Some(EditorKey::MakeChild)
            } else if i.consume_key(egui::Modifiers::NONE, egui::Key::Enter) {
                Some(EditorKey::MakeSibling)
            } else if i.consume_key(egui::Modifiers::NONE, egui::Key::Delete)
                || i.consume_key(egui::Modifiers::NONE, egui::Key::Backspace)
            {
                Some(EditorKey::DeleteSubtree)
            } else {
                None
            };
            (save, key)
        });

        let composing = self.interaction.ime_composing;
        let Some(session) = &mut self.session else {
            return;
        };
        if save {
            session.save_now();
        }
        if let Some(key) = key {
            session.handle_key(key, composing);
        }
    }

    /// Draws the editor toolbar: navigation, title, save state and actions.
    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("⬅ Library").clicked() {
                self.commit_label_edit();
                self.show_dashboard();
                return;
            }
            ui.separator();
            self.draw_title_editor(ui);
            ui.separator();
            self.draw_save_status(ui);

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_label = if self.dark_mode { "☀ Light" } else { "🌙 Dark" };
                if ui.button(theme_label).clicked() {
                    self.dark_mode = !self.dark_mode;
                }
                ui.checkbox(&mut self.canvas.show_grid, "Grid");
                ui.separator();

                let ctx = ui.ctx().clone();
                if ui.button("Export").clicked() {
                    self.export_document(&ctx);
                }
                let history_label = if self.show_history { "Hide history" } else { "History" };
                if ui.button(history_label).clicked() {
                    self.show_history = !self.show_history;
                    if self.show_history {
                        if let Some(session) = &mut self.session {
                            session.refresh_snapshots();
                        }
                    }
                }
                let Some(session) = &mut self.session else {
                    return;
                };
                let snapshot_busy = session.persistence().is_snapshot_busy();
                if ui
                    .add_enabled(!snapshot_busy, egui::Button::new("Snapshot"))
                    .on_hover_text("Store a restorable copy of the current mindmap")
                    .clicked()
                {
                    session.snapshot_now();
                }
                if ui.button("Save").clicked() {
                    session.save_now();
                }
                if ui
                    .button("Tidy")
                    .on_hover_text("Lay out the whole tree from the root")
                    .clicked()
                {
                    session.relayout();
                }
            });
        });
        if let Some(message) = &self.file.status_message {
            ui.small(message.as_str());
        }
    }

    /// The document title, as a label that turns into a text field on click.
    /// Enter or focus loss commits, Escape discards.
    fn draw_title_editor(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &mut self.session else {
            return;
        };

        let Some(draft) = &mut self.title_edit.draft else {
            let title = session.document().title().to_string();
            let response = ui
                .add(egui::Label::new(egui::RichText::new(title.as_str()).heading()).sense(egui::Sense::click()))
                .on_hover_text("Click to rename");
            if response.clicked() {
                self.title_edit.draft = Some(title);
                self.title_edit.focus_requested = false;
            }
            return;
        };

        let response = ui.add(egui::TextEdit::singleline(draft).desired_width(240.0));
        if !self.title_edit.focus_requested {
            response.request_focus();
            self.title_edit.focus_requested = true;
        }
        if response.lost_focus() {
            if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                self.title_edit.draft = None;
            } else if let Some(draft) = self.title_edit.draft.take() {
                session.set_title(&draft);
            }
        }
    }

    fn draw_save_status(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let persistence = session.persistence();
        match persistence.status() {
            SaveStatus::Idle => {
                ui.weak("Not saved yet");
            }
            SaveStatus::Saving => {
                ui.spinner();
                ui.weak("Saving…");
            }
            SaveStatus::Saved => {
                let text = persistence
                    .last_saved_at()
                    .map(|at| format!("Saved {}", at.with_timezone(&chrono::Local).format("%H:%M")))
                    .unwrap_or_else(|| "Saved".to_string());
                ui.weak(text);
            }
            SaveStatus::Error => {
                let response = ui.colored_label(ui.visuals().error_fg_color, "Save failed");
                if let Some(err) = persistence.last_error() {
                    response.on_hover_text(err);
                }
            }
        }
        if persistence.has_unsaved_changes() && persistence.status() != SaveStatus::Saving {
            ui.weak("•");
        }
    }

    /// Draws the canvas: navigation, pointer gestures, then the mindmap itself.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());

        self.center_on_root(response.rect);
        self.handle_canvas_panning(ui, &response);
        self.handle_canvas_zoom(ui, &response);
        self.handle_canvas_clicks(ui, &response);
        self.handle_node_dragging(ui, &response);

        self.render_mindmap(&painter, response.rect);
    }

    /// Applies the label being typed to its node and leaves edit mode.
    pub fn commit_label_edit(&mut self) {
        let Some(node_id) = self.interaction.label_edit_node.take() else {
            return;
        };
        let label = std::mem::take(&mut self.interaction.temp_label);
        self.interaction.focus_requested_for_edit = false;
        if let Some(session) = &mut self.session {
            session.dispatch(&node_id, NodeCommand::Rename(label));
            session.dispatch(&node_id, NodeCommand::FinishEditing);
        }
    }

    /// Leaves edit mode without touching the label.
    fn cancel_label_edit(&mut self) {
        let Some(node_id) = self.interaction.label_edit_node.take() else {
            return;
        };
        self.interaction.temp_label.clear();
        self.interaction.focus_requested_for_edit = false;
        if let Some(session) = &mut self.session {
            session.dispatch(&node_id, NodeCommand::FinishEditing);
        }
    }

    /// Overlays a text field on the node whose label is being edited.
    fn draw_label_editor(&mut self, ctx: &egui::Context) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(node) = session
            .node_render_data()
            .into_iter()
            .find(|node| node.editing)
        else {
            // Editing ended elsewhere (restore, delete); drop the stale buffer
            self.interaction.label_edit_node = None;
            self.interaction.temp_label.clear();
            return;
        };

        if self.interaction.label_edit_node.as_ref() != Some(&node.id) {
            self.commit_label_edit();
            self.interaction.label_edit_node = Some(node.id.clone());
            self.interaction.temp_label = node.label.clone();
            self.interaction.focus_requested_for_edit = false;
        }

        let rect = self.node_screen_rect(&node);
        let field_id = egui::Id::new("node_label_editor").with(&node.id);
        let mut commit = false;
        let mut cancel = false;
        egui::Area::new(egui::Id::new("node_label_area"))
            .fixed_pos(rect.left_center() - egui::vec2(0.0, 12.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.interaction.temp_label)
                        .id(field_id)
                        .desired_width(rect.width()),
                );
                if !self.interaction.focus_requested_for_edit {
                    response.request_focus();
                    self.interaction.focus_requested_for_edit = true;
                    let len = self.interaction.temp_label.chars().count();
                    select_all_text_in_field(ui, field_id, len);
                }
                if response.lost_focus() {
                    if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                        cancel = true;
                    } else {
                        commit = true;
                    }
                }
            });

        if cancel {
            self.cancel_label_edit();
        } else if commit {
            self.commit_label_edit();
        }
    }
}

/// Selects all text in a text edit field using egui's internal state.
fn select_all_text_in_field(ui: &mut egui::Ui, field_id: egui::Id, len: usize) {
    ui.memory_mut(|mem| {
        let state = mem
            .data
            .get_temp_mut_or_default::<egui::text_edit::TextEditState>(field_id);
        state.cursor.set_char_range(Some(egui::text::CCursorRange::two(
            egui::text::CCursor::new(0),
            egui::text::CCursor::new(len),
        )));
    });
}

#[cfg(test)]
mod tests;
