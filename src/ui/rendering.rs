//! Canvas rendering for nodes, edges and the background grid.

use super::canvas::edge_anchor_points;
use super::state::MindmapApp;
use crate::constants::{GRID_SIZE, NODE_CORNER_RADIUS, NODE_HEIGHT, NODE_WIDTH};
use crate::interaction::{EdgeRenderData, EdgeStyle, NodeRenderData};
use crate::types::{NodeId, Position};
use eframe::egui;
use eframe::epaint::{CubicBezierShape, StrokeKind};
use std::collections::HashMap;

const SELECTION_BLUE: egui::Color32 = egui::Color32::from_rgb(100, 150, 255);

impl MindmapApp {
    /// Renders the grid, then edges, then nodes, so nodes sit on top.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `canvas_rect` - The screen-space rectangle of the canvas area
    pub fn render_mindmap(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }
        let Some(session) = &self.session else {
            return;
        };

        let nodes = session.node_render_data();
        let positions: HashMap<&NodeId, Position> =
            nodes.iter().map(|node| (&node.id, node.position)).collect();

        for edge in session.edge_render_data() {
            self.draw_edge(painter, &edge, &positions);
        }

        if let (Some(from_id), Some(draw_pos)) = (
            &self.interaction.drawing_connection_from,
            self.interaction.connection_draw_pos,
        ) {
            if let Some(from) = positions.get(from_id) {
                let start = self.world_to_screen(egui::pos2(from.x + NODE_WIDTH / 2.0, from.y));
                painter.line_segment([start, draw_pos], egui::Stroke::new(2.0, SELECTION_BLUE));
                painter.circle_filled(draw_pos, 4.0 * self.canvas.zoom_factor, SELECTION_BLUE);
            }
        }

        for node in &nodes {
            self.draw_node(painter, node);
        }
    }

    /// Draws a dotted background grid. Skipped when zoomed out too far to read.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let screen_grid = GRID_SIZE * self.canvas.zoom_factor;
        if screen_grid < 6.0 {
            return;
        }
        let color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 60);
        let radius = (1.2 * self.canvas.zoom_factor).clamp(0.6, 2.0);

        let top_left = self.screen_to_world(canvas_rect.min);
        let bottom_right = self.screen_to_world(canvas_rect.max);
        let mut x = (top_left.x / GRID_SIZE).floor() * GRID_SIZE;
        while x <= bottom_right.x {
            let mut y = (top_left.y / GRID_SIZE).floor() * GRID_SIZE;
            while y <= bottom_right.y {
                painter.circle_filled(self.world_to_screen(egui::pos2(x, y)), radius, color);
                y += GRID_SIZE;
            }
            x += GRID_SIZE;
        }
    }

    /// Draws one edge as a horizontal S-curve from the parent's right side to
    /// the child's left side, colored by its emphasis.
    pub fn draw_edge(
        &self,
        painter: &egui::Painter,
        edge: &EdgeRenderData,
        positions: &HashMap<&NodeId, Position>,
    ) {
        let (Some(source), Some(target)) = (positions.get(&edge.source), positions.get(&edge.target)) else {
            return;
        };
        let (start, end) = edge_anchor_points(*source, *target);
        let start = self.world_to_screen(start);
        let end = self.world_to_screen(end);

        let (color, width) = match edge.style {
            EdgeStyle::Selected => (SELECTION_BLUE, 3.0),
            EdgeStyle::Hovered => (egui::Color32::from_rgb(150, 190, 255), 2.5),
            EdgeStyle::Incident => (egui::Color32::from_rgb(255, 200, 90), 2.5),
            EdgeStyle::Default => (egui::Color32::GRAY, 1.5),
        };

        let bend = (end.x - start.x).abs().max(40.0 * self.canvas.zoom_factor) * 0.5;
        let curve = CubicBezierShape::from_points_stroke(
            [
                start,
                egui::pos2(start.x + bend, start.y),
                egui::pos2(end.x - bend, end.y),
                end,
            ],
            false,
            egui::Color32::TRANSPARENT,
            egui::Stroke::new(width * self.canvas.zoom_factor.max(0.5), color),
        );
        painter.add(curve);
    }

    /// Draws a node box with its label. The root is tinted; the selection gets
    /// a highlighted border.
    pub fn draw_node(&self, painter: &egui::Painter, node: &NodeRenderData) {
        let screen_pos = self.world_to_screen(egui::pos2(node.position.x, node.position.y));
        let size = egui::vec2(NODE_WIDTH, NODE_HEIGHT) * self.canvas.zoom_factor;
        let rect = egui::Rect::from_center_size(screen_pos, size);
        let radius = NODE_CORNER_RADIUS * self.canvas.zoom_factor;

        let fill = match (node.is_root, self.dark_mode) {
            (true, true) => egui::Color32::from_rgb(70, 60, 140),
            (true, false) => egui::Color32::from_rgb(200, 195, 255),
            (false, true) => egui::Color32::from_gray(48),
            (false, false) => egui::Color32::from_gray(245),
        };
        painter.rect_filled(rect, radius, fill);

        let dragging = self.interaction.dragging_node.as_ref() == Some(&node.id);
        let (stroke_color, stroke_width) = if dragging {
            (egui::Color32::from_rgb(255, 165, 0), 3.0)
        } else if node.selected {
            (SELECTION_BLUE, 2.5)
        } else {
            (egui::Color32::from_gray(110), 1.0)
        };
        painter.rect_stroke(
            rect,
            radius,
            egui::Stroke::new(stroke_width, stroke_color),
            StrokeKind::Outside,
        );

        // The label editor overlay replaces the text while editing
        if node.editing {
            return;
        }
        let text_color = if self.dark_mode {
            egui::Color32::from_gray(235)
        } else {
            egui::Color32::from_gray(20)
        };
        let font_id = egui::FontId::proportional((13.0 * self.canvas.zoom_factor).clamp(6.0, 48.0));
        let galley = painter.layout(
            node.label.clone(),
            font_id,
            text_color,
            rect.width() - 12.0 * self.canvas.zoom_factor,
        );
        let text_pos = rect.center() - galley.size() / 2.0;
        painter.with_clip_rect(rect).galley(text_pos, galley, text_color);
    }

    /// Screen rectangle of a node, for placing the label editor.
    pub fn node_screen_rect(&self, node: &NodeRenderData) -> egui::Rect {
        let center = self.world_to_screen(egui::pos2(node.position.x, node.position.y));
        egui::Rect::from_center_size(center, egui::vec2(NODE_WIDTH, NODE_HEIGHT) * self.canvas.zoom_factor)
    }
}
