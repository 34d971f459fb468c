use std::rc::Rc;

use glam::{Mat3, Mat4, Vec2, Vec3};
use log::trace;

use super::{Color, Material, ScissorRect, TexEnvMode};
use crate::asset::Mesh;
use crate::backend::{MaterialBinding, RasterBackend, TriangleBatch};
use crate::scene::{Camera, DepthMetric};

/// Renderer state captured when a translucent draw is queued.
#[derive(Debug, Clone)]
pub struct SubmitState {
    pub camera: Rc<Camera>,
    pub matrix: Mat4,
    pub scissor: ScissorRect,
}

/// One deferred translucent draw.
#[derive(Debug, Clone)]
pub struct TransparentEntry {
    /// First vertex in the queue's staging arrays.
    pub first_vertex: usize,
    pub vertex_count: usize,
    pub material: Rc<Material>,
    pub matrix: Mat4,
    pub tex_env_mode: TexEnvMode,
    pub camera: Rc<Camera>,
    pub scissor: ScissorRect,
    pub has_color: bool,
    pub z_order: f32,
    /// False once the entry has been absorbed by its predecessor.
    pub should_draw: bool,
}

impl TransparentEntry {
    /// Entries can share one draw call only when every piece of state matches.
    pub fn can_merge(&self, other: &TransparentEntry) -> bool {
        Rc::ptr_eq(&self.camera, &other.camera)
            && (Rc::ptr_eq(&self.material, &other.material) || *self.material == *other.material)
            && self.matrix == other.matrix
            && self.has_color == other.has_color
            && self.tex_env_mode == other.tex_env_mode
            && self.scissor == other.scissor
    }
}

/// Sort key of a world-space point as seen by `camera`; smaller draws first.
pub fn z_order(camera: &Camera, world_point: Vec3) -> f32 {
    let c = camera.view().transform_point3(world_point);
    match camera.projection_matrix_type().depth_metric() {
        DepthMetric::NegativeDistanceSquared => -c.length_squared(),
        DepthMetric::NearPlaneDepthSquared => {
            let depth = c.z + camera.ortho_near_plane();
            -(depth * depth)
        }
        DepthMetric::DistanceSquared => c.length_squared(),
    }
}

/// Per-frame accumulator of translucent geometry.
///
/// Vertex data is copied into flat staging arrays (three vertices per
/// triangle), so every entry addresses a plain vertex range.
#[derive(Debug, Default)]
pub struct TransparentQueue {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    colors: Vec<Color>,
    entries: Vec<TransparentEntry>,
    sequence: Vec<u32>,
    optimised: bool,
    merged: usize,
}

impl TransparentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TransparentEntry] {
        &self.entries
    }

    /// Entries that still issue a draw call, in draw order.
    pub fn drawable(&self) -> impl Iterator<Item = &TransparentEntry> {
        self.entries.iter().filter(|entry| entry.should_draw)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_optimised(&self) -> bool {
        self.optimised
    }

    /// Copies `triangle_count` triangles starting at `first_index` and queues
    /// them. Zero derives the count from the mesh; a mesh with no triangles
    /// queues nothing. Returns the number of entries added.
    pub fn push_mesh(
        &mut self,
        mesh: &Mesh,
        first_index: usize,
        triangle_count: u32,
        material_index: usize,
        state: &SubmitState,
    ) -> usize {
        let triangle_count = if triangle_count == 0 {
            mesh.triangle_count()
        } else {
            triangle_count
        };
        if triangle_count == 0 {
            return 0;
        }
        assert!(
            material_index < mesh.submesh_count(),
            "submesh {} out of range for mesh '{}'",
            material_index,
            mesh.name()
        );
        if self.optimised {
            self.unmerge();
        }

        let template = TransparentEntry {
            first_vertex: self.vertices.len(),
            vertex_count: 0,
            material: mesh.material(material_index).clone(),
            matrix: state.matrix,
            tex_env_mode: mesh.tex_env_mode(),
            camera: state.camera.clone(),
            scissor: state.scissor,
            has_color: mesh.has_colors(),
            z_order: 0.0,
            should_draw: true,
        };

        if mesh.per_triangle_sorting() {
            let normal_matrix = Mat3::from_mat4(state.matrix).inverse().transpose();
            for t in 0..triangle_count as usize {
                let first_vertex = self.vertices.len();
                let mut centroid = Vec3::ZERO;
                for i in mesh.triangle_indices(first_index, t) {
                    let i = i as usize;
                    let world = state.matrix.transform_point3(mesh.vertex(i));
                    centroid += world;
                    self.vertices.push(world);
                    self.normals
                        .push((normal_matrix * mesh.normal(i)).normalize_or_zero());
                    self.uvs.push(mesh.texture_uv(i));
                    self.colors.push(mesh.color(i));
                }
                self.entries.push(TransparentEntry {
                    first_vertex,
                    vertex_count: 3,
                    matrix: Mat4::IDENTITY,
                    z_order: z_order(&state.camera, centroid / 3.0),
                    ..template.clone()
                });
            }
            trace!(
                "queued {} per-triangle entries from '{}'",
                triangle_count,
                mesh.name()
            );
            return triangle_count as usize;
        }

        let mut centroid = Vec3::ZERO;
        for t in 0..triangle_count as usize {
            for i in mesh.triangle_indices(first_index, t) {
                let i = i as usize;
                let vertex = mesh.vertex(i);
                centroid += vertex;
                self.vertices.push(vertex);
                self.normals.push(mesh.normal(i));
                self.uvs.push(mesh.texture_uv(i));
                self.colors.push(mesh.color(i));
            }
        }
        let vertex_count = triangle_count as usize * 3;
        let world_centroid = state
            .matrix
            .transform_point3(centroid / vertex_count as f32);
        let entry = TransparentEntry {
            vertex_count,
            z_order: z_order(&state.camera, world_centroid),
            ..template
        };
        trace!(
            "queued '{}' ({} triangles) at z-order {}",
            mesh.name(),
            triangle_count,
            entry.z_order
        );
        self.entries.push(entry);
        1
    }

    /// Sorts back-to-front, then merges each run of adjacent compatible
    /// entries into its first entry. Returns the number of absorbed entries.
    pub fn optimise(&mut self) -> usize {
        if self.optimised {
            return self.merged;
        }
        self.entries.sort_by(|a, b| a.z_order.total_cmp(&b.z_order));
        self.repack();

        let mut merged = 0;
        let mut head = 0;
        for i in 1..self.entries.len() {
            if self.entries[head].can_merge(&self.entries[i]) {
                let count = self.entries[i].vertex_count;
                self.entries[head].vertex_count += count;
                self.entries[i].should_draw = false;
                merged += 1;
            } else {
                head = i;
            }
        }
        self.optimised = true;
        self.merged = merged;
        merged
    }

    /// Undoes a previous merge so late submissions can be sorted in.
    fn unmerge(&mut self) {
        let mut head = 0;
        for i in 0..self.entries.len() {
            if self.entries[i].should_draw {
                head = i;
            } else {
                let count = self.entries[i].vertex_count;
                self.entries[head].vertex_count -= count;
                self.entries[i].should_draw = true;
            }
        }
        self.optimised = false;
        self.merged = 0;
    }

    /// Rewrites the staging arrays in entry order so merge candidates own
    /// contiguous ranges.
    fn repack(&mut self) {
        let mut vertices = Vec::with_capacity(self.vertices.len());
        let mut normals = Vec::with_capacity(self.normals.len());
        let mut uvs = Vec::with_capacity(self.uvs.len());
        let mut colors = Vec::with_capacity(self.colors.len());
        for entry in &mut self.entries {
            let range = entry.first_vertex..entry.first_vertex + entry.vertex_count;
            entry.first_vertex = vertices.len();
            vertices.extend_from_slice(&self.vertices[range.clone()]);
            normals.extend_from_slice(&self.normals[range.clone()]);
            uvs.extend_from_slice(&self.uvs[range.clone()]);
            colors.extend_from_slice(&self.colors[range]);
        }
        self.vertices = vertices;
        self.normals = normals;
        self.uvs = uvs;
        self.colors = colors;
    }

    /// Issues one draw per drawable entry and empties the queue. Returns the
    /// number of draw calls.
    pub fn render<B: RasterBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        if !self.optimised {
            self.optimise();
        }
        let longest = self.drawable().map(|e| e.vertex_count).max().unwrap_or(0);
        if self.sequence.len() < longest {
            self.sequence = (0..longest as u32).collect();
        }

        let mut draws = 0;
        for entry in self.entries.iter().filter(|entry| entry.should_draw) {
            let range = entry.first_vertex..entry.first_vertex + entry.vertex_count;
            backend.apply_camera_projection(&entry.camera);
            backend.load_transform(&entry.matrix);
            backend.set_scissor(&entry.scissor);
            backend.bind_material(&MaterialBinding {
                material: &entry.material,
                tex_env_mode: entry.tex_env_mode,
                has_color: entry.has_color,
                alpha_blend: true,
            });
            backend.draw_indexed_triangles(&TriangleBatch {
                vertices: &self.vertices[range.clone()],
                normals: &self.normals[range.clone()],
                uvs: &self.uvs[range.clone()],
                colors: if entry.has_color {
                    &self.colors[range]
                } else {
                    &[]
                },
                indices: &self.sequence[..entry.vertex_count],
            });
            backend.unbind_material();
            draws += 1;
        }
        self.clear();
        draws
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.normals.clear();
        self.uvs.clear();
        self.colors.clear();
        self.entries.clear();
        self.optimised = false;
        self.merged = 0;
    }
}
