use std::borrow::Cow;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::renderer::{Color, Material, TexEnvMode};

/// Primitive layout of the index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshMode {
    #[default]
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Error, PartialEq)]
pub enum MeshValidationError {
    #[error("mesh has no materials")]
    NoMaterials,
    #[error("{materials} materials for {submeshes} submeshes")]
    MaterialCountMismatch { materials: usize, submeshes: usize },
    #[error("face counts cover {faces} triangles but the index buffer holds {indices} indices")]
    FaceCountMismatch { faces: u32, indices: usize },
    #[error("{attribute} array has {len} entries for {vertices} vertices")]
    AttributeLength {
        attribute: &'static str,
        len: usize,
        vertices: usize,
    },
    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
}

/// CPU mesh: parallel vertex attribute arrays, an index buffer and one or
/// more (material, face count) submesh slices.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    mode: MeshMode,
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    colors: Vec<Color>,
    indices: Vec<u32>,
    matrix_indices: Vec<u16>,
    face_counts: Vec<u32>,
    materials: Vec<Rc<Material>>,
    has_vertex_alpha: bool,
    tex_env_mode: TexEnvMode,
    per_triangle_sorting: bool,
    visible: bool,
}

impl Mesh {
    pub fn new(name: impl Into<String>, mode: MeshMode) -> Self {
        Self {
            name: name.into(),
            mode,
            vertices: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            matrix_indices: Vec::new(),
            face_counts: Vec::new(),
            materials: Vec::new(),
            has_vertex_alpha: false,
            tex_env_mode: TexEnvMode::default(),
            per_triangle_sorting: false,
            visible: true,
        }
    }

    pub fn with_vertices(mut self, vertices: Vec<Vec3>) -> Self {
        self.vertices = vertices;
        self
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_colors(mut self, colors: Vec<Color>) -> Self {
        self.set_colors(colors);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_matrix_indices(mut self, matrix_indices: Vec<u16>) -> Self {
        self.matrix_indices = matrix_indices;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials = vec![Rc::new(material)];
        self
    }

    /// One entry per submesh, each paired with its triangle count.
    pub fn with_submeshes(mut self, submeshes: Vec<(Rc<Material>, u32)>) -> Self {
        let (materials, face_counts) = submeshes.into_iter().unzip();
        self.materials = materials;
        self.face_counts = face_counts;
        self
    }

    pub fn with_tex_env_mode(mut self, mode: TexEnvMode) -> Self {
        self.tex_env_mode = mode;
        self
    }

    pub fn with_per_triangle_sorting(mut self, enabled: bool) -> Self {
        self.per_triangle_sorting = enabled;
        self
    }

    pub fn set_colors(&mut self, colors: Vec<Color>) {
        self.has_vertex_alpha = colors.iter().any(|c| !c.is_opaque());
        self.colors = colors;
    }

    pub fn set_color(&mut self, i: usize, color: Color) {
        self.colors[i] = color;
        if !color.is_opaque() {
            self.has_vertex_alpha = true;
        } else if self.has_vertex_alpha {
            self.has_vertex_alpha = self.colors.iter().any(|c| !c.is_opaque());
        }
    }

    pub fn set_material(&mut self, submesh: usize, material: Rc<Material>) {
        self.materials[submesh] = material;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_per_triangle_sorting(&mut self, enabled: bool) {
        self.per_triangle_sorting = enabled;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> MeshMode {
        self.mode
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn tex_env_mode(&self) -> TexEnvMode {
        self.tex_env_mode
    }

    /// Selects per-triangle transparent submission over whole-mesh submission.
    pub fn per_triangle_sorting(&self) -> bool {
        self.per_triangle_sorting
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Length of the index stream; unindexed meshes count one index per vertex.
    pub fn index_count(&self) -> usize {
        if self.indices.is_empty() {
            self.vertices.len()
        } else {
            self.indices.len()
        }
    }

    pub fn vertex(&self, i: usize) -> Vec3 {
        self.vertices[i]
    }

    pub fn normal(&self, i: usize) -> Vec3 {
        self.normals.get(i).copied().unwrap_or(Vec3::Z)
    }

    pub fn texture_uv(&self, i: usize) -> Vec2 {
        self.uvs.get(i).copied().unwrap_or(Vec2::ZERO)
    }

    pub fn color(&self, i: usize) -> Color {
        self.colors.get(i).copied().unwrap_or(Color::WHITE)
    }

    pub fn index(&self, i: usize) -> u32 {
        if self.indices.is_empty() {
            i as u32
        } else {
            self.indices[i]
        }
    }

    pub fn matrix_index(&self, i: usize) -> Option<u16> {
        self.matrix_indices.get(i).copied()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn submesh_count(&self) -> usize {
        self.face_counts.len().max(1)
    }

    /// Material for a submesh. A single material applies to every submesh.
    pub fn material(&self, submesh: usize) -> &Rc<Material> {
        assert!(
            !self.materials.is_empty(),
            "mesh '{}' has no materials",
            self.name
        );
        if self.materials.len() == 1 {
            &self.materials[0]
        } else {
            &self.materials[submesh]
        }
    }

    /// Triangle count implied by the draw mode.
    pub fn triangle_count(&self) -> u32 {
        match self.mode {
            MeshMode::TriangleStrip => self.vertices.len().saturating_sub(2) as u32,
            MeshMode::Triangles => (self.index_count() / 3) as u32,
        }
    }

    pub fn submesh_triangle_count(&self, submesh: usize) -> u32 {
        if self.face_counts.is_empty() {
            self.triangle_count()
        } else {
            self.face_counts[submesh]
        }
    }

    /// Offset of the submesh's first index in the index stream.
    pub fn submesh_first_index(&self, submesh: usize) -> usize {
        let faces: u32 = self.face_counts.iter().take(submesh).sum();
        match self.mode {
            MeshMode::Triangles => faces as usize * 3,
            MeshMode::TriangleStrip => faces as usize,
        }
    }

    /// Vertex indices of triangle `t`, counted from `first_index`.
    pub fn triangle_indices(&self, first_index: usize, t: usize) -> [u32; 3] {
        match self.mode {
            MeshMode::Triangles => {
                let base = first_index + t * 3;
                [self.index(base), self.index(base + 1), self.index(base + 2)]
            }
            MeshMode::TriangleStrip => {
                let k = first_index + t;
                if t % 2 == 0 {
                    [self.index(k), self.index(k + 1), self.index(k + 2)]
                } else {
                    [self.index(k + 1), self.index(k), self.index(k + 2)]
                }
            }
        }
    }

    /// Triangle-list indices for a range, borrowing the index buffer when it
    /// already has that shape.
    pub fn triangle_list_indices(&self, first_index: usize, triangle_count: u32) -> Cow<'_, [u32]> {
        let count = triangle_count as usize;
        if self.mode == MeshMode::Triangles && !self.indices.is_empty() {
            return Cow::Borrowed(&self.indices[first_index..first_index + count * 3]);
        }
        Cow::Owned(
            (0..count)
                .flat_map(|t| self.triangle_indices(first_index, t))
                .collect(),
        )
    }

    /// True when a submesh must go through the sorted translucent path.
    ///
    /// Shadow-texture materials are always composited as opaque. Otherwise
    /// any vertex alpha below 255 or a non-opaque material mode qualifies.
    pub fn has_alpha(&self, submesh: usize) -> bool {
        let material = self.material(submesh);
        if material.is_shadow_texture() {
            return false;
        }
        (self.has_vertex_alpha && self.has_colors()) || material.requires_blending()
    }

    pub fn validate(&self) -> Result<(), MeshValidationError> {
        if self.materials.is_empty() {
            return Err(MeshValidationError::NoMaterials);
        }
        let submeshes = self.submesh_count();
        if self.materials.len() != 1 && self.materials.len() != submeshes {
            return Err(MeshValidationError::MaterialCountMismatch {
                materials: self.materials.len(),
                submeshes,
            });
        }
        if !self.face_counts.is_empty() {
            let faces: u32 = self.face_counts.iter().sum();
            // Strip submeshes run back to back, so the last one reads two
            // indices past its face count.
            let fits = match self.mode {
                MeshMode::Triangles => faces as usize * 3 == self.index_count(),
                MeshMode::TriangleStrip => faces == 0 || faces as usize + 2 <= self.index_count(),
            };
            if !fits {
                return Err(MeshValidationError::FaceCountMismatch {
                    faces,
                    indices: self.index_count(),
                });
            }
        }

        let vertices = self.vertices.len();
        for (attribute, len) in [
            ("normal", self.normals.len()),
            ("uv", self.uvs.len()),
            ("color", self.colors.len()),
        ] {
            if len != 0 && len != vertices {
                return Err(MeshValidationError::AttributeLength {
                    attribute,
                    len,
                    vertices,
                });
            }
        }

        if cfg!(debug_assertions) {
            if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
                return Err(MeshValidationError::IndexOutOfRange { index, vertices });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MaterialFlags;

    fn two_triangles() -> Mesh {
        Mesh::new("quad", MeshMode::Triangles)
            .with_vertices(vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
            ])
            .with_indices(vec![0, 1, 2, 0, 2, 3])
            .with_material(Material::white())
    }

    #[test]
    fn triangle_count_follows_mode() {
        let list = two_triangles();
        assert_eq!(list.triangle_count(), 2);

        let strip = Mesh::new("strip", MeshMode::TriangleStrip)
            .with_vertices(vec![Vec3::ZERO; 5])
            .with_material(Material::white());
        assert_eq!(strip.triangle_count(), 3);

        let empty = Mesh::new("empty", MeshMode::TriangleStrip).with_material(Material::white());
        assert_eq!(empty.triangle_count(), 0);
    }

    #[test]
    fn strip_winding_alternates() {
        let strip = Mesh::new("strip", MeshMode::TriangleStrip)
            .with_vertices(vec![Vec3::ZERO; 4])
            .with_material(Material::white());
        assert_eq!(strip.triangle_indices(0, 0), [0, 1, 2]);
        assert_eq!(strip.triangle_indices(0, 1), [2, 1, 3]);
        assert_eq!(&*strip.triangle_list_indices(0, 2), &[0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn opaque_mesh_has_no_alpha() {
        assert!(!two_triangles().has_alpha(0));
    }

    #[test]
    fn vertex_alpha_gates_translucency() {
        let mut mesh = two_triangles().with_colors(vec![Color::WHITE; 4]);
        assert!(!mesh.has_alpha(0));
        mesh.set_color(2, Color::WHITE.with_alpha(200));
        assert!(mesh.has_alpha(0));
        mesh.set_color(2, Color::WHITE);
        assert!(!mesh.has_alpha(0));
    }

    #[test]
    fn shadow_material_is_never_translucent() {
        let shadow = Material::translucent(Color::BLACK.with_alpha(100))
            .with_flags(MaterialFlags::SHADOW_TEXTURE);
        let mesh = two_triangles()
            .with_colors(vec![Color::WHITE.with_alpha(10); 4])
            .with_material(shadow);
        assert!(!mesh.has_alpha(0));
    }

    #[test]
    fn blended_material_is_translucent() {
        let mesh = two_triangles().with_material(Material::translucent(Color::WHITE));
        assert!(mesh.has_alpha(0));
    }

    #[test]
    fn submeshes_split_the_index_stream() {
        let opaque = Rc::new(Material::white());
        let glass = Rc::new(Material::translucent(Color::WHITE.with_alpha(128)));
        let mesh = two_triangles().with_submeshes(vec![(opaque, 1), (glass, 1)]);

        assert_eq!(mesh.validate(), Ok(()));
        assert_eq!(mesh.submesh_count(), 2);
        assert_eq!(mesh.submesh_first_index(1), 3);
        assert!(!mesh.has_alpha(0));
        assert!(mesh.has_alpha(1));
        assert_eq!(&*mesh.triangle_list_indices(3, 1), &[0, 2, 3]);
    }

    #[test]
    fn validate_rejects_bad_face_counts() {
        let m = Rc::new(Material::white());
        let mesh = two_triangles().with_submeshes(vec![(m.clone(), 1), (m, 3)]);
        assert_eq!(
            mesh.validate(),
            Err(MeshValidationError::FaceCountMismatch {
                faces: 4,
                indices: 6
            })
        );
    }

    #[test]
    fn validate_bounds_strip_face_counts() {
        let m = Rc::new(Material::white());
        let strip = |faces: u32| {
            Mesh::new("strip", MeshMode::TriangleStrip)
                .with_vertices(vec![Vec3::ZERO; 4])
                .with_submeshes(vec![(m.clone(), faces)])
        };
        assert_eq!(strip(2).validate(), Ok(()));
        assert_eq!(
            strip(5).validate(),
            Err(MeshValidationError::FaceCountMismatch {
                faces: 5,
                indices: 4
            })
        );
    }

    #[test]
    fn validate_rejects_material_mismatch() {
        let m = Rc::new(Material::white());
        let mut mesh = two_triangles().with_submeshes(vec![(m.clone(), 1), (m.clone(), 1)]);
        mesh.materials.push(m);
        assert!(matches!(
            mesh.validate(),
            Err(MeshValidationError::MaterialCountMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_short_attributes() {
        let mesh = two_triangles().with_uvs(vec![Vec2::ZERO; 3]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshValidationError::AttributeLength { attribute: "uv", .. })
        ));
    }
}
