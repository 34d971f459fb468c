mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::RecordingBackend;
use glam::{Vec2, Vec3};
use wgpu_layout::layout::{CacheState, CoordinatesType, LayoutEvent, LayoutTree, NodeKey, RatioMode};
use wgpu_layout::renderer::{quad_mesh, Material, Renderer};
use wgpu_layout::scene::Camera;

/// window -> 16:9 letterboxed frame -> quarter-size panel
fn ui_tree(tree: &mut LayoutTree, width: f32, height: f32) -> (NodeKey, NodeKey, NodeKey) {
    let window = tree.create_node();
    tree.set_position(window, Vec3::ZERO);
    tree.set_size(window, Vec3::new(width, height, 1.0));

    let frame = tree.create_node();
    tree.add_child(window, frame);
    tree.set_size_type(frame, CoordinatesType::RelativeToParent);
    tree.set_ratio(frame, 16.0 / 9.0);
    tree.set_ratio_mode(frame, RatioMode::Letterbox);

    let panel = tree.create_node();
    tree.add_child(frame, panel);
    tree.set_size_type(panel, CoordinatesType::RelativeToParent);
    tree.set_size(panel, Vec3::new(0.5, 0.5, 1.0));
    tree.set_position(panel, Vec3::new(0.0, 1.0, 0.0));
    tree.set_anchor(panel, Vec3::new(0.0, 1.0, 0.5));

    (window, frame, panel)
}

#[test]
fn letterboxed_panel_follows_window_resize() {
    let mut tree = LayoutTree::new();
    let (window, frame, panel) = ui_tree(&mut tree, 1920.0, 1080.0);

    assert!(tree.size(frame).truncate().abs_diff_eq(Vec2::new(1920.0, 1080.0), 1e-2));
    assert!(tree.size(panel).truncate().abs_diff_eq(Vec2::new(960.0, 540.0), 1e-2));
    // Panel's top-left corner sits on the frame's; positions are centre-relative.
    let centre = tree.position(panel).truncate();
    assert!(centre.abs_diff_eq(Vec2::new(-480.0, 270.0), 1e-2));

    // A square window letterboxes the frame vertically.
    tree.set_size(window, Vec3::new(1000.0, 1000.0, 1.0));
    assert_eq!(
        tree.cache_state(window, LayoutEvent::SizeChanged),
        Some(CacheState::Stale)
    );
    let frame_size = tree.size(frame).truncate();
    assert!(frame_size.abs_diff_eq(Vec2::new(1000.0, 562.5), 1e-2));
    let panel_size = tree.size(panel).truncate();
    assert!(panel_size.abs_diff_eq(Vec2::new(500.0, 281.25), 1e-2));
}

#[test]
fn world_matrix_notifies_once_per_change() {
    let mut tree = LayoutTree::new();
    let (window, _, panel) = ui_tree(&mut tree, 800.0, 600.0);
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    tree.subscribe(panel, LayoutEvent::WorldMatrixChanged, move |_| {
        counter.set(counter.get() + 1)
    })
    .expect("panel is alive");

    let first = tree.world_transformation_matrix(panel);
    for _ in 0..3 {
        assert_eq!(tree.world_transformation_matrix(panel), first);
    }
    assert_eq!(hits.get(), 1);

    tree.set_position(window, Vec3::new(10.0, 0.0, 0.0));
    let moved = tree.world_transformation_matrix(panel);
    assert_ne!(moved, first);
    assert_eq!(hits.get(), 2);
    assert!(
        (moved.w_axis.x - first.w_axis.x - 10.0).abs() < 1e-4,
        "panel must move with the window"
    );
}

#[test]
fn resolved_node_drives_a_draw() {
    let mut tree = LayoutTree::new();
    let (_, _, panel) = ui_tree(&mut tree, 800.0, 450.0);
    let size = tree.size(panel);
    let matrix = tree.world_transformation_matrix(panel)
        * glam::Mat4::from_scale(Vec3::new(size.x, size.y, 1.0));

    let mut renderer = Renderer::new(RecordingBackend::new(800, 450));
    renderer.set_camera(Rc::new(Camera::screen(800.0, 450.0, 100.0)));
    renderer.begin_frame();
    renderer.load_matrix(matrix);
    renderer.draw_mesh(&quad_mesh("panel", Material::white()));
    renderer.end_frame().expect("recording backend never fails");

    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    // The quad itself is authored in model space; the transform carries the layout.
    let corner = matrix.transform_point3(draws[0].vertices[0]);
    assert!(corner.truncate().abs_diff_eq(Vec2::new(-400.0, 0.0), 1e-2));
}

#[test]
fn destroyed_nodes_leave_no_dangling_links() {
    let mut tree = LayoutTree::new();
    let (window, frame, panel) = ui_tree(&mut tree, 640.0, 360.0);
    assert!(tree.remove_node(frame));

    assert!(!tree.contains(frame));
    assert_eq!(tree.parent(panel), None);
    assert!(tree.children(window).is_empty());
    assert_eq!(tree.link_count(window), 0);
    assert_eq!(tree.link_count(panel), 0);
    // Orphaned relative node has no parent to measure against.
    assert_eq!(tree.size(panel).truncate(), Vec2::ZERO);
}
