//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, node dragging, the
//! shift-drag connect gesture, hit testing, and coordinate transformations
//! between screen and world space.

use super::state::MindmapApp;
use crate::constants::{CLICK_THRESHOLD, EDGE_HIT_DISTANCE, NODE_HEIGHT, NODE_WIDTH};
use crate::types::{EdgeId, NodeId, Position};
use eframe::egui;

/// Screen-independent attachment points of an edge: the parent's right side
/// and the child's left side.
pub fn edge_anchor_points(source: Position, target: Position) -> (egui::Pos2, egui::Pos2) {
    (
        egui::pos2(source.x + NODE_WIDTH / 2.0, source.y),
        egui::pos2(target.x - NODE_WIDTH / 2.0, target.y),
    )
}

impl MindmapApp {
    /// Converts screen coordinates to world coordinates accounting for zoom and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.canvas.offset) / self.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.canvas.zoom_factor + self.canvas.offset
    }

    /// Places the root node a little left of the canvas center, once per document.
    pub fn center_on_root(&mut self, canvas_rect: egui::Rect) {
        if self.canvas.centered {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        let root = session.document().root().position;
        let anchor = egui::pos2(
            canvas_rect.left() + canvas_rect.width() * 0.25,
            canvas_rect.center().y,
        );
        self.canvas.offset = anchor.to_vec2() - egui::vec2(root.x, root.y) * self.canvas.zoom_factor;
        self.canvas.centered = true;
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    self.canvas.offset += current_pos - last_pos;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming, keeping the world point under the cursor fixed.
    /// Zoom range is clamped between 0.25x and 5.0x.
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }
        let Some(mouse_pos) = ui
            .input(|i| i.pointer.hover_pos())
            .or_else(|| response.interact_pointer_pos())
        else {
            return;
        };
        if !response.rect.contains(mouse_pos) {
            return;
        }

        let world_before = self.screen_to_world(mouse_pos);
        let zoom_delta = if scroll_delta > 0.0 { 0.025 } else { -0.025 };
        let old_zoom = self.canvas.zoom_factor;
        self.canvas.zoom_factor = (self.canvas.zoom_factor + zoom_delta).clamp(0.25, 5.0);

        if (self.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
            let world_after = self.world_to_screen(world_before);
            self.canvas.offset += mouse_pos - world_after;
        }
    }

    /// Handles node dragging with the left mouse button, and shift+drag from a
    /// node to connect it to another node.
    pub fn handle_node_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        if self.session.is_none() {
            return;
        }

        if ui.input(|i| i.pointer.primary_down()) && !self.interaction.is_panning {
            let Some(current_pos) = response.interact_pointer_pos() else {
                return;
            };
            let world_pos = self.screen_to_world(current_pos);

            if self.interaction.dragging_node.is_none()
                && self.interaction.drawing_connection_from.is_none()
                && self.interaction.pending_connection_from.is_none()
            {
                let Some(node_id) = self.find_node_at_position(world_pos) else {
                    return;
                };
                if !response.drag_started() && !ui.input(|i| i.pointer.primary_pressed()) {
                    return;
                }
                self.commit_label_edit();
                if ui.input(|i| i.modifiers.shift) {
                    self.interaction.pending_connection_from = Some(node_id);
                    self.interaction.pending_connection_start = Some(current_pos);
                } else {
                    self.start_node_drag(node_id, world_pos);
                }
            } else if let Some(dragging_id) = self.interaction.dragging_node.clone() {
                let target = world_pos + self.interaction.node_drag_offset;
                if let Some(session) = &mut self.session {
                    session.drag_node(&dragging_id, Position::new(target.x, target.y));
                }
            } else if self.interaction.drawing_connection_from.is_some() {
                self.interaction.connection_draw_pos = Some(current_pos);
            } else if let (Some(from_id), Some(start_pos)) = (
                self.interaction.pending_connection_from.clone(),
                self.interaction.pending_connection_start,
            ) {
                let dist_world = (self.screen_to_world(current_pos) - self.screen_to_world(start_pos)).length();
                if dist_world >= CLICK_THRESHOLD {
                    self.interaction.drawing_connection_from = Some(from_id);
                    self.interaction.connection_draw_pos = Some(current_pos);
                    self.interaction.pending_connection_from = None;
                    self.interaction.pending_connection_start = None;
                }
            }
        } else {
            if self.interaction.drawing_connection_from.is_some() {
                if let Some(current_pos) = response.interact_pointer_pos() {
                    let world_pos = self.screen_to_world(current_pos);
                    self.finalize_connection(world_pos);
                }
            }
            // A shift-press that never became a drag is a plain click
            if let Some(node_id) = self.interaction.pending_connection_from.take() {
                if let Some(session) = &mut self.session {
                    session.click_node(&node_id);
                }
            }
            self.interaction.pending_connection_start = None;
            self.interaction.dragging_node = None;
            self.interaction.drawing_connection_from = None;
            self.interaction.connection_draw_pos = None;
        }
    }

    fn start_node_drag(&mut self, node_id: NodeId, world_pos: egui::Pos2) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.click_node(&node_id);
        if let Some(node) = session.document().node(&node_id) {
            let center = egui::pos2(node.position.x, node.position.y);
            self.interaction.node_drag_offset = center - world_pos;
            self.interaction.dragging_node = Some(node_id);
        }
    }

    /// Finishes a connect gesture: the node under the pointer becomes a child
    /// of the node the gesture started on. Invalid targets are ignored.
    fn finalize_connection(&mut self, world_pos: egui::Pos2) {
        let Some(from_id) = self.interaction.drawing_connection_from.clone() else {
            return;
        };
        let Some(to_id) = self.find_node_at_position(world_pos) else {
            return;
        };
        if let Some(session) = &mut self.session {
            session.connect(&from_id, &to_id);
        }
    }

    /// Handles clicks (selection), double clicks (label editing) and edge hover.
    pub fn handle_canvas_clicks(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        if self.session.is_none() {
            return;
        }

        let hovered_edge = response
            .hover_pos()
            .map(|pos| self.screen_to_world(pos))
            .filter(|world| self.find_node_at_position(*world).is_none())
            .and_then(|world| self.find_edge_at_position(world));
        if let Some(session) = &mut self.session {
            session.hover_edge(hovered_edge.as_deref());
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(pos);
                if let Some(node_id) = self.find_node_at_position(world_pos) {
                    if let Some(session) = &mut self.session {
                        session.click_node(&node_id);
                        session.begin_editing(&node_id);
                    }
                }
            }
            return;
        }

        if response.clicked()
            && !self.interaction.is_panning
            && !ui.input(|i| i.modifiers.shift)
        {
            let Some(pos) = response.interact_pointer_pos() else {
                return;
            };
            let world_pos = self.screen_to_world(pos);
            let node = self.find_node_at_position(world_pos);
            let edge = self.find_edge_at_position(world_pos);
            self.commit_label_edit();
            let Some(session) = &mut self.session else {
                return;
            };
            match (node, edge) {
                (Some(node_id), _) => session.click_node(&node_id),
                (None, Some(edge_id)) => session.click_edge(&edge_id),
                (None, None) => session.click_pane(),
            }
        }
    }

    /// Finds the topmost node at the given world position, if any.
    pub fn find_node_at_position(&self, pos: egui::Pos2) -> Option<NodeId> {
        let session = self.session.as_ref()?;
        let node_size = egui::vec2(NODE_WIDTH, NODE_HEIGHT);
        session
            .document()
            .nodes()
            .iter()
            .rev()
            .find(|node| {
                egui::Rect::from_center_size(egui::pos2(node.position.x, node.position.y), node_size)
                    .contains(pos)
            })
            .map(|node| node.id.clone())
    }

    /// Finds the edge passing within the hit distance of a world position, if any.
    pub fn find_edge_at_position(&self, pos: egui::Pos2) -> Option<EdgeId> {
        let session = self.session.as_ref()?;
        let doc = session.document();
        doc.edges()
            .iter()
            .find(|edge| {
                let (Some(source), Some(target)) = (doc.node(&edge.source), doc.node(&edge.target)) else {
                    return false;
                };
                let (start, end) = edge_anchor_points(source.position, target.position);
                point_to_segment_distance(pos, start, end) < EDGE_HIT_DISTANCE
            })
            .map(|edge| edge.id.clone())
    }
}

/// Distance from a point to a line segment.
fn point_to_segment_distance(point: egui::Pos2, start: egui::Pos2, end: egui::Pos2) -> f32 {
    let line = end - start;
    let to_point = point - start;
    let len_sq = line.length_sq();
    if len_sq < 0.0001 {
        return to_point.length();
    }
    let t = (to_point.dot(line) / len_sq).clamp(0.0, 1.0);
    (point - (start + line * t)).length()
}
