//! Rasterizer boundary. The renderer talks to exactly one backend, chosen
//! once at startup through [`create_backend`].

mod gpu;
mod software;
mod state;

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use winit::window::Window;

pub use gpu::GpuBackend;
pub use software::SoftwareBackend;
pub use state::{shade, BoundMaterial, FixedFunctionState};

use crate::error::BackendError;
use crate::renderer::{Color, Material, ScissorRect, TexEnvMode};
use crate::scene::Camera;
use crate::settings::RenderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Wgpu,
    Software,
}

/// Where a backend presents its frames.
pub enum BackendTarget {
    Window(Arc<Window>),
    Headless { width: u32, height: u32 },
}

impl BackendTarget {
    fn describe(&self) -> &'static str {
        match self {
            BackendTarget::Window(_) => "window",
            BackendTarget::Headless { .. } => "headless",
        }
    }
}

/// Material state for the draws that follow.
#[derive(Debug, Clone, Copy)]
pub struct MaterialBinding<'a> {
    pub material: &'a Material,
    pub tex_env_mode: TexEnvMode,
    /// Per-vertex colours replace the material's diffuse colour.
    pub has_color: bool,
    pub alpha_blend: bool,
}

/// Parallel attribute slices plus a triangle-list index stream.
/// Empty attribute slices fall back to defaults.
#[derive(Debug, Clone, Copy)]
pub struct TriangleBatch<'a> {
    pub vertices: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub uvs: &'a [Vec2],
    pub colors: &'a [Color],
    pub indices: &'a [u32],
}

impl TriangleBatch<'_> {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn uv(&self, i: usize) -> Vec2 {
        self.uvs.get(i).copied().unwrap_or(Vec2::ZERO)
    }

    pub fn color(&self, i: usize) -> Option<Color> {
        self.colors.get(i).copied()
    }
}

pub trait RasterBackend {
    fn kind(&self) -> BackendKind;

    fn begin_frame(&mut self, clear: Color);

    fn apply_camera_projection(&mut self, camera: &Camera);

    fn load_transform(&mut self, matrix: &Mat4);

    fn set_scissor(&mut self, scissor: &ScissorRect);

    fn bind_material(&mut self, binding: &MaterialBinding<'_>);

    fn unbind_material(&mut self);

    fn draw_indexed_triangles(&mut self, batch: &TriangleBatch<'_>);

    fn end_frame(&mut self) -> Result<(), BackendError>;

    /// Resets depth mid-frame so later layers ignore earlier geometry.
    fn clear_depth(&mut self) {}

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn viewport_size(&self) -> (u32, u32);
}

impl<B: RasterBackend + ?Sized> RasterBackend for Box<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn begin_frame(&mut self, clear: Color) {
        (**self).begin_frame(clear)
    }

    fn apply_camera_projection(&mut self, camera: &Camera) {
        (**self).apply_camera_projection(camera)
    }

    fn load_transform(&mut self, matrix: &Mat4) {
        (**self).load_transform(matrix)
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) {
        (**self).set_scissor(scissor)
    }

    fn bind_material(&mut self, binding: &MaterialBinding<'_>) {
        (**self).bind_material(binding)
    }

    fn unbind_material(&mut self) {
        (**self).unbind_material()
    }

    fn draw_indexed_triangles(&mut self, batch: &TriangleBatch<'_>) {
        (**self).draw_indexed_triangles(batch)
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        (**self).end_frame()
    }

    fn clear_depth(&mut self) {
        (**self).clear_depth()
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }

    fn viewport_size(&self) -> (u32, u32) {
        (**self).viewport_size()
    }
}

/// One-shot backend selection. A kind/target mismatch or a missing GPU is
/// returned as an error; callers treat it as fatal.
pub fn create_backend(
    kind: BackendKind,
    target: BackendTarget,
    settings: &RenderSettings,
) -> Result<Box<dyn RasterBackend>, BackendError> {
    log::info!("Creating {:?} backend for {} target", kind, target.describe());
    match (kind, target) {
        (BackendKind::Wgpu, BackendTarget::Window(window)) => {
            Ok(Box::new(pollster::block_on(GpuBackend::new(window, settings))?))
        }
        (BackendKind::Software, BackendTarget::Headless { width, height }) => {
            Ok(Box::new(SoftwareBackend::new(width, height)))
        }
        (kind, target) => Err(BackendError::Unsupported {
            kind,
            target: target.describe(),
        }),
    }
}
