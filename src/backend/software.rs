use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use super::{
    shade, BackendKind, BoundMaterial, FixedFunctionState, MaterialBinding, RasterBackend,
    TriangleBatch,
};
use crate::error::BackendError;
use crate::renderer::{Color, ScissorRect};
use crate::scene::Camera;

const ALPHA_TEST_THRESHOLD: u8 = 128;

/// CPU rasterizer writing into an RGBA8 image with an `f32` depth buffer.
///
/// Depth uses the 0..1 clip range and a less-or-equal test. Blended draws
/// test depth but never write it.
pub struct SoftwareBackend {
    color: RgbaImage,
    depth: Vec<f32>,
    state: FixedFunctionState,
    frame: u64,
    frame_triangles: usize,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            color: RgbaImage::new(width, height),
            depth: vec![1.0; (width * height) as usize],
            state: FixedFunctionState::default(),
            frame: 0,
            frame_triangles: 0,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.color
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let Rgba([r, g, b, a]) = *self.color.get_pixel(x, y);
        Color::new(r, g, b, a)
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.color.width() + x) as usize]
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), BackendError> {
        let path = path.as_ref();
        self.color
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| BackendError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Wrote frame {} to {:?}", self.frame, path);
        Ok(())
    }

    fn to_screen(&self, clip: Vec4) -> Vec3 {
        let ndc = clip.truncate() / clip.w;
        let (w, h) = (self.color.width() as f32, self.color.height() as f32);
        Vec3::new((ndc.x * 0.5 + 0.5) * w, (0.5 - ndc.y * 0.5) * h, ndc.z)
    }

    fn write_fragment(&mut self, x: u32, y: u32, z: f32, src: Color, material: &BoundMaterial) {
        let index = (y * self.color.width() + x) as usize;
        if material.alpha_blend {
            let dst = self.pixel(x, y);
            let a = src.a as f32 / 255.0;
            let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
            let out_a = (src.a as f32 + dst.a as f32 * (1.0 - a)).round().min(255.0) as u8;
            self.color.put_pixel(
                x,
                y,
                Rgba([mix(src.r, dst.r), mix(src.g, dst.g), mix(src.b, dst.b), out_a]),
            );
        } else {
            self.color.put_pixel(x, y, Rgba([src.r, src.g, src.b, src.a]));
            self.depth[index] = z;
        }
    }

    fn rasterize_triangle(
        &mut self,
        batch: &TriangleBatch<'_>,
        corners: [usize; 3],
        mvp: &Mat4,
        material: &BoundMaterial,
        bounds: (u32, u32, u32, u32),
    ) {
        let clip = corners.map(|i| *mvp * batch.vertices[i].extend(1.0));
        // No near-plane clipping: triangles crossing the eye plane are dropped.
        if clip.iter().any(|c| c.w <= f32::EPSILON) {
            return;
        }
        let screen = clip.map(|c| self.to_screen(c));
        let area = edge(screen[0], screen[1], screen[2].truncate());
        if area.abs() <= f32::EPSILON {
            return;
        }

        let min = screen.iter().fold(Vec2::splat(f32::INFINITY), |m, p| m.min(p.truncate()));
        let max = screen
            .iter()
            .fold(Vec2::splat(f32::NEG_INFINITY), |m, p| m.max(p.truncate()));
        let x0 = (min.x.floor().max(bounds.0 as f32)) as u32;
        let y0 = (min.y.floor().max(bounds.1 as f32)) as u32;
        let x1 = (max.x.ceil().min(bounds.2 as f32)) as u32;
        let y1 = (max.y.ceil().min(bounds.3 as f32)) as u32;

        let inv_w = clip.map(|c| 1.0 / c.w);
        let colors = corners.map(|i| batch.color(i).map(Color::to_f32));
        let uvs = corners.map(|i| batch.uv(i));

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b = [
                    edge(screen[1], screen[2], p) / area,
                    edge(screen[2], screen[0], p) / area,
                    edge(screen[0], screen[1], p) / area,
                ];
                if b.iter().any(|&w| w < 0.0) {
                    continue;
                }
                let z = b[0] * screen[0].z + b[1] * screen[1].z + b[2] * screen[2].z;
                if !(0.0..=1.0).contains(&z) || z > self.depth[(y * self.color.width() + x) as usize]
                {
                    continue;
                }

                let pw = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
                let sum = pw[0] + pw[1] + pw[2];
                let pc = pw.map(|w| w / sum);

                let vertex_color = match colors {
                    [Some(c0), Some(c1), Some(c2)] => Some(Color::from_f32(std::array::from_fn(
                        |k| c0[k] * pc[0] + c1[k] * pc[1] + c2[k] * pc[2],
                    ))),
                    _ => None,
                };
                let base = material.base_color(vertex_color);
                let texel = material.texture.as_ref().map(|texture| {
                    texture.sample_nearest(uvs[0] * pc[0] + uvs[1] * pc[1] + uvs[2] * pc[2])
                });
                let src = shade(material.tex_env_mode, base, texel);
                if material.alpha_test && src.a < ALPHA_TEST_THRESHOLD {
                    continue;
                }
                self.write_fragment(x, y, z, src, material);
            }
        }
    }
}

fn edge(a: Vec3, b: Vec3, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl RasterBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn begin_frame(&mut self, clear: Color) {
        for pixel in self.color.pixels_mut() {
            *pixel = Rgba([clear.r, clear.g, clear.b, clear.a]);
        }
        self.depth.fill(1.0);
        self.frame_triangles = 0;
    }

    fn apply_camera_projection(&mut self, camera: &Camera) {
        self.state.view_proj = camera.view_proj();
    }

    fn load_transform(&mut self, matrix: &Mat4) {
        self.state.model = *matrix;
    }

    fn set_scissor(&mut self, scissor: &ScissorRect) {
        self.state.scissor = *scissor;
    }

    fn bind_material(&mut self, binding: &MaterialBinding<'_>) {
        self.state.material = Some(BoundMaterial::from_binding(binding));
    }

    fn unbind_material(&mut self) {
        self.state.material = None;
    }

    fn draw_indexed_triangles(&mut self, batch: &TriangleBatch<'_>) {
        let (width, height) = self.viewport_size();
        let Some(bounds) = self.state.scissor.clip_bounds(width, height) else {
            return;
        };
        let material = self.state.material();
        let mvp = self.state.mvp();
        for tri in batch.indices.chunks_exact(3) {
            let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            self.rasterize_triangle(batch, corners, &mvp, &material, bounds);
        }
        self.frame_triangles += batch.triangle_count();
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        log::trace!(
            "software frame {} rasterized {} triangles",
            self.frame,
            self.frame_triangles
        );
        self.frame += 1;
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.depth.fill(1.0);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.color = RgbaImage::new(width, height);
        self.depth = vec![1.0; (width * height) as usize];
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.color.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::renderer::{Material, MaterialMode, TexEnvMode, Texture};

    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    fn quad(z: f32) -> [Vec3; 4] {
        [
            Vec3::new(-1.0, -1.0, z),
            Vec3::new(1.0, -1.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(-1.0, 1.0, z),
        ]
    }

    fn backend() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new(8, 8);
        backend.begin_frame(Color::BLACK);
        backend.apply_camera_projection(&Camera::custom(Mat4::IDENTITY));
        backend.load_transform(&Mat4::IDENTITY);
        backend
    }

    fn draw(backend: &mut SoftwareBackend, material: &Material, z: f32, colors: &[Color]) {
        let vertices = quad(z);
        backend.bind_material(&MaterialBinding {
            material,
            tex_env_mode: TexEnvMode::Modulate,
            has_color: !colors.is_empty(),
            alpha_blend: material.requires_blending(),
        });
        backend.draw_indexed_triangles(&TriangleBatch {
            vertices: &vertices,
            normals: &[],
            uvs: &[],
            colors,
            indices: &QUAD_INDICES,
        });
        backend.unbind_material();
    }

    #[test]
    fn opaque_quad_fills_viewport() {
        let mut backend = backend();
        draw(&mut backend, &Material::new(Color::rgb(255, 0, 0)), 0.5, &[]);
        assert_eq!(backend.pixel(0, 0), Color::rgb(255, 0, 0));
        assert_eq!(backend.pixel(7, 7), Color::rgb(255, 0, 0));
        assert!((backend.depth_at(3, 3) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn nearer_opaque_wins_depth_test() {
        let mut backend = backend();
        draw(&mut backend, &Material::new(Color::rgb(0, 0, 255)), 0.2, &[]);
        draw(&mut backend, &Material::new(Color::rgb(255, 0, 0)), 0.6, &[]);
        assert_eq!(backend.pixel(4, 4), Color::rgb(0, 0, 255));
    }

    #[test]
    fn blended_quad_mixes_and_keeps_depth() {
        let mut backend = backend();
        draw(&mut backend, &Material::new(Color::rgb(255, 0, 0)), 0.5, &[]);
        draw(
            &mut backend,
            &Material::translucent(Color::new(0, 255, 0, 128)),
            0.25,
            &[],
        );
        let out = backend.pixel(4, 4);
        assert!((out.r as i32 - 127).abs() <= 1, "red {}", out.r);
        assert!((out.g as i32 - 128).abs() <= 1, "green {}", out.g);
        assert_eq!(out.a, 255);
        assert!((backend.depth_at(4, 4) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn scissor_limits_writes() {
        let mut backend = backend();
        backend.set_scissor(&ScissorRect::new(0, 0, 4, 4));
        draw(&mut backend, &Material::new(Color::WHITE), 0.5, &[]);
        assert_eq!(backend.pixel(1, 1), Color::WHITE);
        assert_eq!(backend.pixel(6, 6), Color::BLACK);
    }

    #[test]
    fn alpha_test_discards_transparent_fragments() {
        let mut backend = backend();
        let material = Material::new(Color::WHITE).with_mode(MaterialMode::AlphaTest);
        let colors = [Color::WHITE.with_alpha(0); 4];
        backend.bind_material(&MaterialBinding {
            material: &material,
            tex_env_mode: TexEnvMode::Modulate,
            has_color: true,
            alpha_blend: false,
        });
        let vertices = quad(0.5);
        backend.draw_indexed_triangles(&TriangleBatch {
            vertices: &vertices,
            normals: &[],
            uvs: &[],
            colors: &colors,
            indices: &QUAD_INDICES,
        });
        assert_eq!(backend.pixel(4, 4), Color::BLACK);
        assert_eq!(backend.depth_at(4, 4), 1.0);
    }

    #[test]
    fn replace_mode_shows_texture() {
        let mut backend = backend();
        let texel = Color::rgb(10, 200, 30);
        let material = Material::new(Color::rgb(255, 0, 0))
            .with_texture(Rc::new(Texture::solid("solid", texel)));
        backend.bind_material(&MaterialBinding {
            material: &material,
            tex_env_mode: TexEnvMode::Replace,
            has_color: false,
            alpha_blend: false,
        });
        let vertices = quad(0.5);
        let uvs = [Vec2::ZERO; 4];
        backend.draw_indexed_triangles(&TriangleBatch {
            vertices: &vertices,
            normals: &[],
            uvs: &uvs,
            colors: &[],
            indices: &QUAD_INDICES,
        });
        assert_eq!(backend.pixel(2, 5), texel);
    }

    #[test]
    fn vertex_colors_interpolate() {
        let mut backend = backend();
        let colors = [Color::rgb(100, 100, 100); 4];
        draw(&mut backend, &Material::new(Color::WHITE), 0.5, &colors);
        assert_eq!(backend.pixel(3, 3), Color::rgb(100, 100, 100));
    }

    #[test]
    fn begin_frame_clears_color_and_depth() {
        let mut backend = backend();
        draw(&mut backend, &Material::new(Color::WHITE), 0.1, &[]);
        backend.begin_frame(Color::rgb(1, 2, 3));
        assert_eq!(backend.pixel(0, 0), Color::rgb(1, 2, 3));
        assert_eq!(backend.depth_at(0, 0), 1.0);
    }

    #[test]
    fn save_png_writes_file() {
        let backend = backend();
        let path = std::env::temp_dir().join(format!("wgpu_layout_{}.png", std::process::id()));
        backend.save_png(&path).expect("png written");
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}
