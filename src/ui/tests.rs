use super::state::{PendingConfirmAction, Screen};
use super::*;
use eframe::egui;
use crate::config::EditorConfig;
use crate::constants::NEW_DOCUMENT_TITLE;
use crate::store::{DocumentStore, MemoryStore, SnapshotRecord};
use crate::types::{DocJson, DocNode, DocNodeData, Position};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

struct Harness {
    /// Keeps spawned store calls running
    _runtime: Runtime,
    store: Arc<MemoryStore>,
    app: MindmapApp,
    ctx: egui::Context,
}

fn harness() -> Harness {
    let rt = Runtime::new().expect("runtime");
    let store = Arc::new(MemoryStore::new());
    let services = AppServices {
        store: store.clone(),
        runtime: rt.handle().clone(),
        config: EditorConfig::default(),
    };
    let app = MindmapApp::new(services, UiPreferences::default());
    Harness {
        _runtime: rt,
        store,
        app,
        ctx: egui::Context::default(),
    }
}

/// Opens a fresh document with the root drawn at screen (300, 300).
fn harness_with_document() -> Harness {
    let mut h = harness();
    let record = h.store.create_document("Ideas").expect("create");
    h.app.enter_editor(record);
    h.app.canvas.centered = true;
    h.app.canvas.offset = egui::vec2(300.0, 300.0);
    h.app.canvas.zoom_factor = 1.0;
    h
}

fn raw_input(events: Vec<egui::Event>, modifiers: egui::Modifiers) -> egui::RawInput {
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(1200.0, 800.0),
    ));
    raw.modifiers = modifiers;
    raw.events = events;
    raw
}

/// Runs one full app frame on the harness context.
fn run_app_frame(h: &mut Harness, events: Vec<egui::Event>) {
    let raw = raw_input(events, egui::Modifiers::NONE);
    let app = &mut h.app;
    let _ = h.ctx.run(raw, |ctx| app.show(ctx));
}

/// Runs one frame that only draws the canvas.
fn run_canvas_frame(h: &mut Harness, events: Vec<egui::Event>, modifiers: egui::Modifiers) {
    let raw = raw_input(events, modifiers);
    let app = &mut h.app;
    let _ = h.ctx.run(raw, |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });
}

fn key_press(key: egui::Key) -> egui::Event {
    egui::Event::Key {
        key,
        physical_key: Some(key),
        pressed: true,
        repeat: false,
        modifiers: egui::Modifiers::NONE,
    }
}

fn pointer_button(pos: egui::Pos2, pressed: bool) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button: egui::PointerButton::Primary,
        pressed,
        modifiers: egui::Modifiers::NONE,
    }
}

/// Keeps drawing frames until `done` holds or a generous deadline passes.
fn run_until(h: &mut Harness, mut done: impl FnMut(&MindmapApp) -> bool) {
    for _ in 0..200 {
        run_app_frame(h, Vec::new());
        if done(&h.app) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn session(h: &mut Harness) -> &mut crate::session::EditorSession {
    h.app.session.as_mut().expect("editor open")
}

fn root_id(h: &mut Harness) -> String {
    session(h).document().root().id.clone()
}

fn screen_pos_of(h: &mut Harness, id: &str) -> egui::Pos2 {
    let position = session(h).document().node(id).expect("node").position;
    h.app.world_to_screen(egui::pos2(position.x, position.y))
}

#[test]
fn clicking_canvas_selects_node() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_pane();

    let click_pos = egui::pos2(300.0, 300.0);

    // First frame: move cursor over the node to establish hover
    run_canvas_frame(&mut h, vec![egui::Event::PointerMoved(click_pos)], egui::Modifiers::NONE);

    // Second frame: pressing the primary button over the node selects it
    run_canvas_frame(
        &mut h,
        vec![egui::Event::PointerMoved(click_pos), pointer_button(click_pos, true)],
        egui::Modifiers::NONE,
    );

    assert_eq!(session(&mut h).interaction().selection().node(), Some(root.as_str()));
}

#[test]
fn click_empty_space_clears_selection() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);

    let empty = egui::pos2(900.0, 650.0);
    run_canvas_frame(&mut h, vec![egui::Event::PointerMoved(empty)], egui::Modifiers::NONE);
    run_canvas_frame(&mut h, vec![pointer_button(empty, true)], egui::Modifiers::NONE);
    run_canvas_frame(&mut h, vec![pointer_button(empty, false)], egui::Modifiers::NONE);

    assert_eq!(session(&mut h).interaction().selection().node(), None);
}

#[test]
fn tab_key_adds_child_and_opens_label_editor() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);

    run_app_frame(&mut h, vec![key_press(egui::Key::Tab)]);

    let session = session(&mut h);
    assert_eq!(session.document().nodes().len(), 2);
    let child = session.interaction().editing().expect("new child is being edited").to_string();
    assert_eq!(session.document().parent_of(&child), Some(root.as_str()));
    assert_eq!(h.app.interaction.label_edit_node.as_deref(), Some(child.as_str()));
}

#[test]
fn enter_in_label_editor_commits_the_label() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);

    run_app_frame(&mut h, vec![key_press(egui::Key::Tab)]);
    let child = session(&mut h).interaction().editing().expect("editing").to_string();
    run_app_frame(&mut h, Vec::new());

    h.app.interaction.temp_label = "  Research  ".into();
    run_app_frame(&mut h, vec![key_press(egui::Key::Enter)]);

    let session = session(&mut h);
    assert_eq!(session.document().node(&child).expect("child").label, "Research");
    assert_eq!(session.interaction().editing(), None);
    // Enter went to the text field, not to the sibling shortcut
    assert_eq!(session.document().nodes().len(), 2);
}

#[test]
fn keys_are_ignored_while_title_field_has_focus() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);
    h.app.title_edit.draft = Some("Ideas".into());

    // First frame focuses the title field
    run_app_frame(&mut h, Vec::new());
    run_app_frame(&mut h, vec![key_press(egui::Key::Tab)]);

    assert_eq!(session(&mut h).document().nodes().len(), 1);
}

#[test]
fn delete_key_removes_selected_subtree() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);
    let child = session(&mut h).new_child().expect("child");
    session(&mut h).new_child().expect("grandchild");
    session(&mut h).click_pane();
    session(&mut h).click_node(&child);
    assert_eq!(session(&mut h).document().nodes().len(), 3);

    run_app_frame(&mut h, vec![key_press(egui::Key::Delete)]);

    let session = session(&mut h);
    assert_eq!(session.document().nodes().len(), 1);
    assert_eq!(session.interaction().selection().node(), Some(root.as_str()));
}

#[test]
fn shift_drag_connects_nodes() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);
    let first = session(&mut h).new_child().expect("first");
    session(&mut h).click_node(&root);
    let second = session(&mut h).new_child().expect("second");
    session(&mut h).click_pane();

    let start = screen_pos_of(&mut h, &first);
    let end = screen_pos_of(&mut h, &second);
    let shift = egui::Modifiers {
        shift: true,
        ..Default::default()
    };

    run_canvas_frame(&mut h, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    run_canvas_frame(&mut h, Vec::new(), egui::Modifiers::NONE);
    run_canvas_frame(
        &mut h,
        vec![egui::Event::PointerMoved(start), pointer_button(start, true)],
        shift,
    );
    run_canvas_frame(&mut h, vec![egui::Event::PointerMoved(end)], shift);
    run_canvas_frame(&mut h, vec![pointer_button(end, false)], egui::Modifiers::NONE);

    let session = session(&mut h);
    assert_eq!(session.document().parent_of(&second), Some(first.as_str()));
    assert_eq!(session.interaction().selection().node(), Some(second.as_str()));
}

#[test]
fn drawing_canvas_with_nodes_produces_shapes() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);
    session(&mut h).new_child();

    let raw = raw_input(Vec::new(), egui::Modifiers::NONE);
    let app = &mut h.app;
    let output = h.ctx.run(raw, |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });

    assert!(!output.shapes.is_empty());
}

#[test]
fn failed_load_shows_alert_and_returns_to_dashboard() {
    let mut h = harness();
    h.app.open_document("does-not-exist");
    assert_eq!(h.app.screen, Screen::Loading);

    run_until(&mut h, |app| app.screen == Screen::Dashboard);

    assert_eq!(h.app.screen, Screen::Dashboard);
    assert!(h.app.alert.is_some());
    assert!(h.app.session.is_none());
}

#[test]
fn opening_a_document_enters_the_editor() {
    let mut h = harness();
    let record = h.store.create_document("Trip").expect("create");
    h.app.open_document(&record.id);

    run_until(&mut h, |app| app.screen == Screen::Editor);

    assert_eq!(h.app.screen, Screen::Editor);
    assert_eq!(session(&mut h).document().title(), "Trip");
}

#[test]
fn creating_from_dashboard_opens_new_document() {
    let mut h = harness();
    run_until(&mut h, |app| !app.dashboard.is_loading());
    h.app.dashboard.create();

    run_until(&mut h, |app| app.screen == Screen::Editor);

    assert_eq!(session(&mut h).document().title(), NEW_DOCUMENT_TITLE);
    assert_eq!(h.store.list_documents(0, 10).expect("list").total, 1);
}

#[test]
fn confirming_restore_replaces_document() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    session(&mut h).click_node(&root);
    session(&mut h).new_child();
    let document_id = session(&mut h).document_id().to_string();

    let snapshot = SnapshotRecord {
        id: "snap-1".into(),
        document_id,
        doc_json: DocJson {
            nodes: vec![DocNode {
                id: "restored-root".into(),
                position: Position::new(0.0, 0.0),
                data: DocNodeData {
                    label: "Restored".into(),
                    parent_id: None,
                },
            }],
            edges: Vec::new(),
        },
        created_at: chrono::Utc::now(),
    };
    h.app.pending_confirm = Some(PendingConfirmAction::RestoreSnapshot(snapshot));
    h.app.confirm_pending_action();

    assert!(h.app.pending_confirm.is_none());
    let session = session(&mut h);
    assert_eq!(session.document().nodes().len(), 1);
    assert_eq!(session.document().root().label, "Restored");
    assert_eq!(session.interaction().selection().node(), Some("restored-root"));
    assert!(session.persistence().is_dirty());
}

#[test]
fn returning_to_dashboard_flushes_pending_edits() {
    let mut h = harness_with_document();
    let root = root_id(&mut h);
    let document_id = session(&mut h).document_id().to_string();

    // Let the session observe the loaded state before editing
    run_app_frame(&mut h, Vec::new());
    session(&mut h).click_node(&root);
    session(&mut h).new_child();
    run_app_frame(&mut h, Vec::new());

    h.app.show_dashboard();
    assert!(h.app.session.is_none());

    let store = h.store.clone();
    let saved = (0..200).find_map(|_| {
        let record = store.read_document(&document_id).ok()?;
        match record.doc_json {
            Some(doc) if doc.nodes.len() == 2 => Some(doc),
            _ => {
                std::thread::sleep(Duration::from_millis(5));
                None
            }
        }
    });
    assert!(saved.is_some(), "closing the editor writes the pending edit");
}

#[test]
fn preferences_round_trip_through_storage_json() {
    let mut h = harness();
    h.app.dark_mode = false;
    h.app.canvas.zoom_factor = 1.5;
    h.app.canvas.show_grid = false;

    let json = serde_json::to_string(&h.app.preferences()).expect("serialize");
    let restored: UiPreferences = serde_json::from_str(&json).expect("deserialize");
    let app = MindmapApp::new(h.app.services.clone(), restored);

    assert!(!app.dark_mode);
    assert_eq!(app.canvas.zoom_factor, 1.5);
    assert!(!app.canvas.show_grid);

    // Missing fields fall back to defaults
    let partial: UiPreferences = serde_json::from_str("{\"dark_mode\":false}").expect("partial");
    assert_eq!(partial.zoom_factor, 1.0);
    assert!(partial.show_grid);
}
