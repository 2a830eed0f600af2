//! The document library screen, the snapshot history drawer and modal dialogs.

use super::state::{MindmapApp, PendingConfirmAction};
use crate::store::DocumentRecord;
use chrono::{DateTime, Local, Utc};
use eframe::egui;

const CARD_WIDTH: f32 = 220.0;

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

impl MindmapApp {
    /// Draws the library: a grid of document cards with paging, create and delete.
    pub fn draw_dashboard(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("dashboard_toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Mindmaps");
                ui.separator();
                if ui
                    .add_enabled(!self.dashboard.is_loading(), egui::Button::new("➕ New mindmap"))
                    .clicked()
                {
                    self.dashboard.create();
                }
                if ui.button("⟳ Refresh").clicked() {
                    self.dashboard.refresh();
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let theme_label = if self.dark_mode { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(theme_label).clicked() {
                        self.dark_mode = !self.dark_mode;
                    }
                    if self.dashboard.is_loading() {
                        ui.spinner();
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("dashboard_pager").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(self.dashboard.has_previous(), egui::Button::new("◀ Previous"))
                    .clicked()
                {
                    self.dashboard.previous_page();
                }
                ui.label(format!(
                    "Page {} · {} mindmaps",
                    self.dashboard.page() + 1,
                    self.dashboard.total()
                ));
                if ui
                    .add_enabled(self.dashboard.has_more(), egui::Button::new("Next ▶"))
                    .clicked()
                {
                    self.dashboard.next_page();
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(err) = self.dashboard.error() {
                ui.colored_label(ui.visuals().error_fg_color, err);
            }
            if self.dashboard.documents().is_empty() && !self.dashboard.is_loading() {
                ui.centered_and_justified(|ui| {
                    ui.weak("No mindmaps yet. Create one to get started.");
                });
                return;
            }

            let columns = ((ui.available_width() / (CARD_WIDTH + 12.0)).floor() as usize).max(1);
            let documents = self.dashboard.documents().to_vec();
            let mut open = None;
            let mut delete = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("document_grid")
                    .spacing(egui::vec2(12.0, 12.0))
                    .show(ui, |ui| {
                        for (i, record) in documents.iter().enumerate() {
                            match draw_document_card(ui, record) {
                                CardAction::Open => open = Some(record.id.clone()),
                                CardAction::Delete => delete = Some(record.clone()),
                                CardAction::None => {}
                            }
                            if (i + 1) % columns == 0 {
                                ui.end_row();
                            }
                        }
                    });
            });

            if let Some(id) = open {
                self.open_document(&id);
            }
            if let Some(record) = delete {
                self.pending_confirm = Some(PendingConfirmAction::DeleteDocument {
                    id: record.id,
                    title: record.title,
                });
            }
        });
    }

    /// Lists recent snapshots of the open document, newest first.
    pub fn draw_history_panel(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &mut self.session else {
            return;
        };
        ui.horizontal(|ui| {
            ui.heading("History");
            if ui.small_button("⟳").on_hover_text("Reload snapshots").clicked() {
                session.refresh_snapshots();
            }
        });
        ui.separator();

        let persistence = session.persistence();
        if persistence.snapshots_loading() {
            ui.spinner();
        }
        if persistence.snapshots().is_empty() && !persistence.snapshots_loading() {
            ui.weak("No snapshots yet.");
            return;
        }

        let mut restore = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for snapshot in persistence.snapshots() {
                ui.group(|ui| {
                    ui.set_width(ui.available_width());
                    ui.label(local_time(snapshot.created_at));
                    ui.horizontal(|ui| {
                        ui.weak(format!("{} nodes", snapshot.node_count()));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Restore").clicked() {
                                restore = Some(snapshot.clone());
                            }
                        });
                    });
                });
            }
        });

        if let Some(snapshot) = restore {
            self.pending_confirm = Some(PendingConfirmAction::RestoreSnapshot(snapshot));
        }
    }

    /// Shows the confirmation window for a pending restore or delete.
    pub fn draw_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(action) = &self.pending_confirm else {
            return;
        };
        let (title, prompt, confirm_label) = match action {
            PendingConfirmAction::RestoreSnapshot(snapshot) => (
                "Restore snapshot?",
                format!(
                    "Replace the current mindmap with the snapshot from {}? Unsaved edits are lost.",
                    local_time(snapshot.created_at)
                ),
                "Restore",
            ),
            PendingConfirmAction::DeleteDocument { title, .. } => (
                "Delete mindmap?",
                format!("Delete \"{title}\" and all of its snapshots? This cannot be undone."),
                "Delete",
            ),
        };

        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(prompt);
                ui.horizontal(|ui| {
                    if ui.button(confirm_label).clicked() {
                        confirmed = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if confirmed {
            self.confirm_pending_action();
        } else if cancelled {
            self.pending_confirm = None;
        }
    }

    /// Carries out the action awaiting confirmation.
    pub fn confirm_pending_action(&mut self) {
        match self.pending_confirm.take() {
            Some(PendingConfirmAction::RestoreSnapshot(snapshot)) => {
                self.commit_label_edit();
                if let Some(session) = &mut self.session {
                    session.restore_snapshot(&snapshot);
                }
            }
            Some(PendingConfirmAction::DeleteDocument { id, .. }) => self.dashboard.delete(&id),
            None => {}
        }
    }

    /// Shows a blocking alert until dismissed.
    pub fn draw_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.alert else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Something went wrong")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(message.as_str());
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alert = None;
        }
    }
}

enum CardAction {
    None,
    Open,
    Delete,
}

fn draw_document_card(ui: &mut egui::Ui, record: &DocumentRecord) -> CardAction {
    let mut action = CardAction::None;
    let node_count = record.doc_json.as_ref().map_or(1, |doc| doc.nodes.len().max(1));
    let response = egui::Frame::group(ui.style())
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.strong(record.title.as_str());
            ui.weak(format!("Edited {}", local_time(record.updated_at)));
            ui.horizontal(|ui| {
                ui.weak(format!("{node_count} nodes"));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("🗑").on_hover_text("Delete").clicked() {
                        action = CardAction::Delete;
                    }
                    if ui.small_button("Open").clicked() {
                        action = CardAction::Open;
                    }
                });
            });
        })
        .response;
    if matches!(action, CardAction::None) && response.interact(egui::Sense::click()).double_clicked() {
        action = CardAction::Open;
    }
    action
}
