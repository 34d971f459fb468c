#![allow(dead_code)]

use glam::{Mat4, Vec3};
use wgpu_layout::asset::{Mesh, MeshMode};
use wgpu_layout::backend::{BackendKind, MaterialBinding, RasterBackend, TriangleBatch};
use wgpu_layout::error::BackendError;
use wgpu_layout::renderer::{Color, Material, ScissorRect};
use wgpu_layout::scene::Camera;

/// One backend call, with just enough state to assert on.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    Camera(String),
    Transform(Mat4),
    Scissor(ScissorRect),
    Bind { diffuse: Color, alpha_blend: bool },
    Unbind,
    Draw(DrawRecord),
    ClearDepth,
    EndFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub diffuse: Color,
    pub alpha_blend: bool,
    pub triangles: usize,
    pub scissor: ScissorRect,
    /// Vertices in index order, as the rasterizer would read them.
    pub vertices: Vec<Vec3>,
}

/// Backend that rasterizes nothing and remembers every call.
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    size: (u32, u32),
    bound: Option<(Color, bool)>,
    scissor: ScissorRect,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Vec::new(),
            size: (width, height),
            bound: None,
            scissor: ScissorRect::DISABLED,
        }
    }

    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RasterBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn begin_frame(&mut self, _clear: Color) {
        self.calls.push(Call::BeginFrame);
    }

    fn apply_camera_projection(&mut self, camera: &Camera) {
        self.calls.push(Call::Camera(camera.name.clone()));
    }

    fn load_transform(&mut self, matrix: &Mat4) {
        self.calls.push(Call::Transform(*matrix));
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) {
        self.scissor = *scissor;
        self.calls.push(Call::Scissor(*scissor));
    }

    fn bind_material(&mut self, binding: &MaterialBinding<'_>) {
        let diffuse = binding.material.diffuse_color;
        self.bound = Some((diffuse, binding.alpha_blend));
        self.calls.push(Call::Bind {
            diffuse,
            alpha_blend: binding.alpha_blend,
        });
    }

    fn unbind_material(&mut self) {
        self.bound = None;
        self.calls.push(Call::Unbind);
    }

    fn draw_indexed_triangles(&mut self, batch: &TriangleBatch<'_>) {
        let (diffuse, alpha_blend) = self.bound.unwrap_or((Color::WHITE, false));
        self.calls.push(Call::Draw(DrawRecord {
            diffuse,
            alpha_blend,
            triangles: batch.triangle_count(),
            scissor: self.scissor,
            vertices: batch
                .indices
                .iter()
                .map(|&i| batch.vertices[i as usize])
                .collect(),
        }));
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.calls.push(Call::ClearDepth);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.size
    }
}

/// Perspective camera at the origin looking down -Z.
pub fn origin_camera() -> Camera {
    Camera::perspective(60f32.to_radians(), 1.0, 0.1, 100.0).with_name("origin")
}

/// Single triangle whose centroid is `centre`.
pub fn triangle_at(name: &str, centre: Vec3, material: Material) -> Mesh {
    Mesh::new(name, MeshMode::Triangles)
        .with_vertices(vec![
            centre + Vec3::new(-0.1, -0.1, 0.0),
            centre + Vec3::new(0.1, -0.1, 0.0),
            centre + Vec3::new(0.0, 0.2, 0.0),
        ])
        .with_material(material)
}
