use glam::{Mat4, Vec3};

use super::Transform;

/// Projection family of a camera. Each family orders translucent geometry
/// with its own depth metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
    /// Caller-supplied projection matrix.
    Custom,
}

/// Scalar used to sort translucent draws; smaller draws first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthMetric {
    /// `-|c|²`, farther geometry sorts first.
    NegativeDistanceSquared,
    /// `-(c.z + near)²`, depth from the near plane only.
    NearPlaneDepthSquared,
    /// `|c|²`, unsigned.
    DistanceSquared,
}

impl ProjectionType {
    pub fn depth_metric(self) -> DepthMetric {
        match self {
            ProjectionType::Perspective => DepthMetric::NegativeDistanceSquared,
            ProjectionType::Orthographic => DepthMetric::NearPlaneDepthSquared,
            ProjectionType::Custom => DepthMetric::DistanceSquared,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub name: String,
    /// Placement of the camera in world space; the view matrix is its inverse.
    pub transform: Transform,
    pub projection: ProjectionType,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho: OrthoBounds,
    pub custom_projection: Mat4,
}

impl Camera {
    pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            name: "perspective".to_string(),
            transform: Transform::IDENTITY,
            projection: ProjectionType::Perspective,
            fov_y_radians,
            aspect,
            near,
            far,
            ortho: OrthoBounds {
                left: -1.0,
                right: 1.0,
                bottom: -1.0,
                top: 1.0,
            },
            custom_projection: Mat4::IDENTITY,
        }
    }

    pub fn orthographic(bounds: OrthoBounds, near: f32, far: f32) -> Self {
        let height = (bounds.top - bounds.bottom).abs().max(f32::EPSILON);
        Self {
            name: "orthographic".to_string(),
            projection: ProjectionType::Orthographic,
            aspect: (bounds.right - bounds.left).abs() / height,
            ortho: bounds,
            ..Self::perspective(60f32.to_radians(), 1.0, near, far)
        }
    }

    /// Pixel-unit orthographic camera centred on the origin, looking down -Z
    /// from `distance` so that layout z-offsets in `[0, distance)` stay visible.
    pub fn screen(width: f32, height: f32, distance: f32) -> Self {
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        let mut camera = Self::orthographic(
            OrthoBounds {
                left: -half_w,
                right: half_w,
                bottom: -half_h,
                top: half_h,
            },
            1.0,
            distance * 2.0,
        );
        camera.name = "screen".to_string();
        camera.transform = Transform::from_translation(Vec3::new(0.0, 0.0, distance));
        camera
    }

    pub fn custom(projection: Mat4) -> Self {
        Self {
            name: "custom".to_string(),
            projection: ProjectionType::Custom,
            custom_projection: projection,
            ..Self::perspective(60f32.to_radians(), 1.0, 0.1, 100.0)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn look_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.transform = Transform::from_matrix(Mat4::look_at_rh(eye, target, up).inverse());
        self
    }

    pub fn view(&self) -> Mat4 {
        self.transform.matrix().inverse()
    }

    pub fn proj(&self) -> Mat4 {
        match self.projection {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => Mat4::orthographic_rh(
                self.ortho.left,
                self.ortho.right,
                self.ortho.bottom,
                self.ortho.top,
                self.near,
                self.far,
            ),
            ProjectionType::Custom => self.custom_projection,
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn projection_matrix_type(&self) -> ProjectionType {
        self.projection
    }

    pub fn ortho_near_plane(&self) -> f32 {
        self.near
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0).look_at(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::ZERO,
            Vec3::Y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn view_proj_is_reasonable() {
        let cam = Camera::default();
        let vp = cam.view_proj();
        // Just ensure it's invertible and finite
        let inv = vp.inverse();
        let id = vp * inv;
        let eps = 1e-4;
        assert!(id.abs_diff_eq(Mat4::IDENTITY, eps));
    }

    #[test]
    fn look_at_view_matches_glam() {
        let eye = Vec3::new(1.0, 2.0, 5.0);
        let cam = Camera::default().look_at(eye, Vec3::ZERO, Vec3::Y);
        let expected = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        assert!(cam.view().abs_diff_eq(expected, 1e-4));
        assert!(cam.position().abs_diff_eq(eye, 1e-4));
    }

    #[test]
    fn screen_camera_maps_origin_to_centre() {
        let cam = Camera::screen(800.0, 600.0, 500.0);
        let clip = cam.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
        assert_eq!(cam.projection_matrix_type(), ProjectionType::Orthographic);
    }

    #[test]
    fn each_projection_has_its_metric() {
        assert_eq!(
            ProjectionType::Perspective.depth_metric(),
            DepthMetric::NegativeDistanceSquared
        );
        assert_eq!(
            ProjectionType::Orthographic.depth_metric(),
            DepthMetric::NearPlaneDepthSquared
        );
        assert_eq!(
            ProjectionType::Custom.depth_metric(),
            DepthMetric::DistanceSquared
        );
    }
}
