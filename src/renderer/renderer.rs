// renderer/renderer.rs
use std::rc::Rc;

use glam::Mat4;
use log::{debug, warn};

use super::{Color, TransparentQueue};
use crate::asset::Mesh;
use crate::backend::{MaterialBinding, RasterBackend, TriangleBatch};
use crate::error::BackendError;
use crate::renderer::transparent::SubmitState;
use crate::scene::Camera;

/// Pixel rectangle with a top-left origin. Disabled rectangles clip nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    pub enabled: bool,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub const DISABLED: Self = Self {
        enabled: false,
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            enabled: true,
            x,
            y,
            width,
            height,
        }
    }

    /// `(x0, y0, x1, y1)` with exclusive ends, clamped to the viewport.
    /// `None` when nothing can be drawn.
    pub fn clip_bounds(&self, viewport_width: u32, viewport_height: u32) -> Option<(u32, u32, u32, u32)> {
        let (x0, y0, x1, y1) = if self.enabled {
            (
                self.x.min(viewport_width),
                self.y.min(viewport_height),
                self.x.saturating_add(self.width).min(viewport_width),
                self.y.saturating_add(self.height).min(viewport_height),
            )
        } else {
            (0, 0, viewport_width, viewport_height)
        };
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }
}

/// Per-frame counters, logged at debug level by [`Renderer::end_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub opaque_draw_calls: usize,
    pub transparent_entries: usize,
    pub transparent_draw_calls: usize,
    pub merged_entries: usize,
    pub transparent_vertices: usize,
}

pub struct Renderer<B: RasterBackend = Box<dyn RasterBackend>> {
    backend: B,
    transparent: TransparentQueue,
    matrix_stack: Vec<Mat4>,
    current_matrix: Mat4,
    camera: Rc<Camera>,
    scissor: ScissorRect,
    clear_color: Color,
    stats: FrameStats,
}

impl<B: RasterBackend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            transparent: TransparentQueue::new(),
            matrix_stack: Vec::new(),
            current_matrix: Mat4::IDENTITY,
            camera: Rc::new(Camera::default()),
            scissor: ScissorRect::DISABLED,
            clear_color: Color::BLACK,
            stats: FrameStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn transparent_queue(&self) -> &TransparentQueue {
        &self.transparent
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn camera(&self) -> &Rc<Camera> {
        &self.camera
    }

    /// Makes `camera` current for subsequent draws.
    pub fn set_camera(&mut self, camera: Rc<Camera>) {
        self.camera = camera;
        self.backend.apply_camera_projection(&self.camera);
    }

    pub fn scissor(&self) -> ScissorRect {
        self.scissor
    }

    pub fn set_scissor(&mut self, scissor: ScissorRect) {
        self.scissor = scissor;
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        self.backend.viewport_size()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    pub fn current_matrix(&self) -> Mat4 {
        self.current_matrix
    }

    pub fn push_matrix(&mut self) {
        self.matrix_stack.push(self.current_matrix);
    }

    pub fn pop_matrix(&mut self) {
        match self.matrix_stack.pop() {
            Some(matrix) => self.current_matrix = matrix,
            None => warn!("pop_matrix on an empty matrix stack"),
        }
    }

    pub fn load_matrix(&mut self, matrix: Mat4) {
        self.current_matrix = matrix;
    }

    pub fn mult_matrix(&mut self, matrix: Mat4) {
        self.current_matrix *= matrix;
    }

    pub fn load_identity(&mut self) {
        self.current_matrix = Mat4::IDENTITY;
    }

    /// Starts a frame: drops anything a previous frame failed to flush and
    /// clears the target.
    pub fn begin_frame(&mut self) {
        if !self.transparent.is_empty() {
            warn!(
                "Dropping {} unflushed translucent entries from the previous frame",
                self.transparent.entries().len()
            );
            self.transparent.clear();
        }
        if !self.matrix_stack.is_empty() {
            warn!("Matrix stack left {} deep; resetting", self.matrix_stack.len());
            self.matrix_stack.clear();
        }
        self.stats = FrameStats::default();
        self.backend.begin_frame(self.clear_color);
        self.backend.apply_camera_projection(&self.camera);
    }

    /// Discards depth so later draws sit on top of everything drawn so far.
    pub fn clear_depth(&mut self) {
        self.backend.clear_depth();
    }

    /// Draws the opaque submeshes now and queues the rest for the sorted
    /// translucent pass.
    pub fn draw_mesh(&mut self, mesh: &Mesh) {
        if let Err(err) = mesh.validate() {
            panic!("mesh '{}' is malformed: {}", mesh.name(), err);
        }
        if !mesh.visible() {
            return;
        }
        for submesh in 0..mesh.submesh_count() {
            let first_index = mesh.submesh_first_index(submesh);
            let triangles = mesh.submesh_triangle_count(submesh);
            if triangles == 0 {
                continue;
            }
            if mesh.has_alpha(submesh) {
                self.add_transparent_mesh(mesh, first_index, triangles, submesh);
            } else {
                self.draw_opaque(mesh, first_index, triangles, submesh);
            }
        }
    }

    fn draw_opaque(&mut self, mesh: &Mesh, first_index: usize, triangles: u32, submesh: usize) {
        let indices = mesh.triangle_list_indices(first_index, triangles);
        self.backend.load_transform(&self.current_matrix);
        self.backend.set_scissor(&self.scissor);
        self.backend.bind_material(&MaterialBinding {
            material: mesh.material(submesh),
            tex_env_mode: mesh.tex_env_mode(),
            has_color: mesh.has_colors(),
            alpha_blend: false,
        });
        self.backend.draw_indexed_triangles(&TriangleBatch {
            vertices: mesh.vertices(),
            normals: mesh.normals(),
            uvs: mesh.uvs(),
            colors: mesh.colors(),
            indices: &indices,
        });
        self.backend.unbind_material();
        self.stats.opaque_draw_calls += 1;
    }

    /// Queues triangles for the translucent pass using the current camera,
    /// matrix and scissor. Returns the number of entries queued.
    pub fn add_transparent_mesh(
        &mut self,
        mesh: &Mesh,
        first_index: usize,
        triangle_count: u32,
        material_index: usize,
    ) -> usize {
        let state = SubmitState {
            camera: self.camera.clone(),
            matrix: self.current_matrix,
            scissor: self.scissor,
        };
        self.transparent
            .push_mesh(mesh, first_index, triangle_count, material_index, &state)
    }

    /// Sorts the queued translucent entries and merges adjacent compatible
    /// ones. Returns the number of merged entries.
    pub fn optimise_transparent_mesh_properties(&mut self) -> usize {
        self.transparent.optimise()
    }

    /// Draws and empties the translucent queue, then restores the renderer's
    /// own camera, matrix and scissor on the backend.
    pub fn render_transparent_meshes(&mut self) -> usize {
        if self.transparent.is_empty() {
            return 0;
        }
        let merged = self.transparent.optimise();
        self.stats.transparent_entries += self.transparent.entries().len();
        self.stats.transparent_vertices += self.transparent.vertex_count();
        self.stats.merged_entries += merged;

        let draws = self.transparent.render(&mut self.backend);
        self.stats.transparent_draw_calls += draws;

        self.backend.apply_camera_projection(&self.camera);
        self.backend.load_transform(&self.current_matrix);
        self.backend.set_scissor(&self.scissor);
        draws
    }

    pub fn end_frame(&mut self) -> Result<FrameStats, BackendError> {
        self.render_transparent_meshes();
        self.backend.end_frame()?;
        debug!("Frame stats: {:?}", self.stats);
        Ok(self.stats)
    }
}
