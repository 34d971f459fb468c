use glam::{Vec2, Vec3};

use super::Material;
use crate::asset::{Mesh, MeshMode};

/// Unit quad in the XY plane, centred on the origin, facing +Z.
/// Layout nodes scale it by their resolved size.
pub fn quad_mesh(name: &str, material: Material) -> Mesh {
    Mesh::new(name, MeshMode::Triangles)
        .with_vertices(vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ])
        .with_normals(vec![Vec3::Z; 4])
        .with_uvs(vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ])
        .with_indices(vec![0, 1, 2, 0, 2, 3])
        .with_material(material)
}

/// Same quad as a four-vertex triangle strip.
pub fn quad_strip_mesh(name: &str, material: Material) -> Mesh {
    Mesh::new(name, MeshMode::TriangleStrip)
        .with_vertices(vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
        ])
        .with_normals(vec![Vec3::Z; 4])
        .with_uvs(vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
        ])
        .with_material(material)
}

/// Unit cube with flat per-face normals: 24 vertices, 12 triangles.
pub fn cube_mesh(name: &str, material: Material) -> Mesh {
    // (normal, u axis, v axis) per face
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            vertices.push(normal * 0.5 + u * su + v * sv);
            normals.push(normal);
            uvs.push(Vec2::new(su + 0.5, 0.5 - sv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    Mesh::new(name, MeshMode::Triangles)
        .with_vertices(vertices)
        .with_normals(normals)
        .with_uvs(uvs)
        .with_indices(indices)
        .with_material(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Color;

    #[test]
    fn quad_is_two_triangles() {
        let quad = quad_mesh("q", Material::white());
        assert_eq!(quad.triangle_count(), 2);
        assert!(quad.validate().is_ok());
        let strip = quad_strip_mesh("s", Material::white());
        assert_eq!(strip.triangle_count(), 2);
        assert!(strip.validate().is_ok());
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let cube = cube_mesh("c", Material::new(Color::WHITE));
        assert_eq!(cube.triangle_count(), 12);
        for t in 0..12 {
            let [a, b, c] = cube.triangle_indices(0, t).map(|i| cube.vertex(i as usize));
            let face_normal = (b - a).cross(c - a).normalize();
            let centre = (a + b + c) / 3.0;
            assert!(face_normal.dot(centre) > 0.0, "triangle {t} faces inwards");
        }
    }
}
