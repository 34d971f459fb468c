mod common;

use std::rc::Rc;

use common::{origin_camera, triangle_at, Call, RecordingBackend};
use glam::{Mat4, Vec3};
use wgpu_layout::renderer::{quad_mesh, Color, Material, Renderer, ScissorRect};

const EPSILON: f32 = 1e-4;

fn renderer() -> Renderer<RecordingBackend> {
    let mut renderer = Renderer::new(RecordingBackend::new(64, 64));
    renderer.set_camera(Rc::new(origin_camera()));
    renderer
}

#[test]
fn opaque_first_then_translucent_back_to_front() {
    let mut renderer = renderer();
    let opaque = Color::rgb(10, 200, 10);
    let far = Color::new(255, 0, 0, 128);
    let near = Color::new(0, 0, 255, 128);

    let a = quad_mesh("a", Material::new(opaque));
    let b = triangle_at("b", Vec3::new(0.0, 0.0, -5f32.sqrt()), Material::translucent(far));
    let c = triangle_at("c", Vec3::new(0.0, 0.0, -1.0), Material::translucent(near));

    renderer.begin_frame();
    renderer.draw_mesh(&a);
    renderer.draw_mesh(&b);
    renderer.draw_mesh(&c);

    // A is rasterized at submission; B and C wait in the queue.
    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].diffuse, opaque);
    assert_eq!(draws[0].triangles, 2);
    assert!(!draws[0].alpha_blend);

    let entries = renderer.transparent_queue().entries();
    assert_eq!(entries.len(), 2);
    assert!((entries[0].z_order + 5.0).abs() < EPSILON);
    assert!((entries[1].z_order + 1.0).abs() < EPSILON);

    let flushed = renderer.render_transparent_meshes();
    assert_eq!(flushed, 2);
    assert!(renderer.transparent_queue().is_empty());

    let order: Vec<_> = renderer
        .backend()
        .draws()
        .iter()
        .map(|d| (d.diffuse, d.alpha_blend))
        .collect();
    assert_eq!(order, vec![(opaque, false), (far, true), (near, true)]);
}

#[test]
fn submission_order_does_not_matter() {
    let mut renderer = renderer();
    let colors = [
        Color::new(255, 0, 0, 100),
        Color::new(0, 255, 0, 100),
        Color::new(0, 0, 255, 100),
    ];
    // Submitted middle, near, far.
    let depths = [-4.0, -2.0, -8.0];

    renderer.begin_frame();
    for (i, (&depth, &color)) in depths.iter().zip(colors.iter()).enumerate() {
        let mesh = triangle_at(
            &format!("t{i}"),
            Vec3::new(0.0, 0.0, depth),
            Material::translucent(color),
        );
        renderer.draw_mesh(&mesh);
    }
    renderer.end_frame().expect("recording backend never fails");

    let drawn: Vec<_> = renderer.backend().draws().iter().map(|d| d.diffuse).collect();
    assert_eq!(drawn, vec![colors[2], colors[0], colors[1]]);
}

#[test]
fn identical_state_merges_into_one_draw() {
    let mut renderer = renderer();
    let material = Material::translucent(Color::new(200, 200, 200, 90));

    renderer.begin_frame();
    for depth in [-3.0, -6.0, -9.0] {
        renderer.draw_mesh(&triangle_at("t", Vec3::new(0.0, 0.0, depth), material.clone()));
    }
    let merged = renderer.optimise_transparent_mesh_properties();
    assert_eq!(merged, 2);
    renderer.render_transparent_meshes();

    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].triangles, 3);
    // Farthest triangle leads the merged range.
    assert!((draws[0].vertices[0].z + 9.0).abs() < EPSILON);
    assert!((draws[0].vertices[8].z + 3.0).abs() < EPSILON);
}

#[test]
fn differing_scissor_splits_the_run() {
    let mut renderer = renderer();
    let material = Material::translucent(Color::new(200, 200, 200, 90));
    let clipped = ScissorRect::new(0, 0, 32, 32);

    renderer.begin_frame();
    // After sorting: far (open), middle (clipped), near (open).
    for (depth, scissor) in [
        (-9.0, ScissorRect::DISABLED),
        (-6.0, clipped),
        (-3.0, ScissorRect::DISABLED),
    ] {
        renderer.set_scissor(scissor);
        renderer.draw_mesh(&triangle_at("t", Vec3::new(0.0, 0.0, depth), material.clone()));
    }
    renderer.set_scissor(ScissorRect::DISABLED);
    let merged = renderer.optimise_transparent_mesh_properties();
    renderer.render_transparent_meshes();

    // The two open entries are compatible but not adjacent.
    assert_eq!(merged, 0);
    let scissors: Vec<_> = renderer.backend().draws().iter().map(|d| d.scissor).collect();
    assert_eq!(
        scissors,
        vec![ScissorRect::DISABLED, clipped, ScissorRect::DISABLED]
    );
}

#[test]
fn trailing_incompatible_entry_leaves_two_draws() {
    let mut renderer = renderer();
    let shared = Material::translucent(Color::new(200, 200, 200, 90));
    let other = Material::translucent(Color::new(20, 20, 20, 90));

    renderer.begin_frame();
    renderer.draw_mesh(&triangle_at("a", Vec3::new(0.0, 0.0, -9.0), shared.clone()));
    renderer.draw_mesh(&triangle_at("b", Vec3::new(0.0, 0.0, -6.0), shared));
    renderer.draw_mesh(&triangle_at("c", Vec3::new(0.0, 0.0, -3.0), other));
    renderer.render_transparent_meshes();

    let triangles: Vec<_> = renderer.backend().draws().iter().map(|d| d.triangles).collect();
    assert_eq!(triangles, vec![2, 1]);
}

#[test]
fn flush_restores_renderer_state() {
    let mut renderer = renderer();
    let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let scissor = ScissorRect::new(4, 4, 8, 8);

    renderer.begin_frame();
    renderer.load_matrix(model);
    renderer.set_scissor(scissor);
    renderer.draw_mesh(&triangle_at(
        "t",
        Vec3::new(0.0, 0.0, -5.0),
        Material::translucent(Color::new(1, 2, 3, 4)),
    ));
    renderer.backend_mut().clear();
    renderer.render_transparent_meshes();

    let calls = &renderer.backend().calls;
    let tail: Vec<_> = calls.iter().rev().take(3).cloned().collect();
    assert_eq!(
        tail,
        vec![
            Call::Scissor(scissor),
            Call::Transform(model),
            Call::Camera("origin".to_string()),
        ]
    );
}

#[test]
fn per_triangle_entries_are_pre_transformed() {
    let mut renderer = renderer();
    let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0));
    let mesh = quad_mesh("q", Material::translucent(Color::new(9, 9, 9, 99)))
        .with_per_triangle_sorting(true);

    renderer.begin_frame();
    renderer.load_matrix(model);
    renderer.draw_mesh(&mesh);

    let entries = renderer.transparent_queue().entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.matrix == Mat4::IDENTITY));

    renderer.render_transparent_meshes();
    let draws = renderer.backend().draws();
    // Both halves share state after pre-transform, so they merge.
    assert_eq!(draws.len(), 1);
    assert!(draws[0].vertices.iter().all(|v| (v.z + 4.0).abs() < EPSILON));
}

#[test]
fn leftover_queue_is_dropped_at_next_frame() {
    let mut renderer = renderer();
    renderer.begin_frame();
    renderer.draw_mesh(&triangle_at(
        "t",
        Vec3::new(0.0, 0.0, -2.0),
        Material::translucent(Color::new(1, 1, 1, 1)),
    ));
    assert!(!renderer.transparent_queue().is_empty());

    renderer.begin_frame();
    assert!(renderer.transparent_queue().is_empty());
    assert_eq!(renderer.stats().transparent_entries, 0);
}

#[test]
fn end_frame_reports_stats() {
    let mut renderer = renderer();
    let material = Material::translucent(Color::new(50, 50, 50, 50));

    renderer.begin_frame();
    renderer.draw_mesh(&quad_mesh("opaque", Material::white()));
    for depth in [-2.0, -4.0] {
        renderer.draw_mesh(&triangle_at("t", Vec3::new(0.0, 0.0, depth), material.clone()));
    }
    let stats = renderer.end_frame().expect("recording backend never fails");

    assert_eq!(stats.opaque_draw_calls, 1);
    assert_eq!(stats.transparent_entries, 2);
    assert_eq!(stats.merged_entries, 1);
    assert_eq!(stats.transparent_draw_calls, 1);
    assert_eq!(stats.transparent_vertices, 6);
    assert_eq!(renderer.backend().calls.last(), Some(&Call::EndFrame));
}
