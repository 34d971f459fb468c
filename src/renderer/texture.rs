// renderer/texture.rs (CPU-side texture shared by materials)

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use image::{Rgba, RgbaImage};

use super::Color;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded RGBA8 pixels plus a process-unique identity.
///
/// Materials hold textures behind `Rc`, and two materials bind "the same
/// texture" only when they point at the same allocation. The id gives
/// backends a stable cache key for the uploaded copy.
pub struct Texture {
    id: u64,
    name: String,
    image: RgbaImage,
}

impl Texture {
    pub fn from_image(name: impl Into<String>, image: RgbaImage) -> Self {
        let id = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        log::debug!(
            "Texture {} '{}' created ({}x{})",
            id,
            name,
            image.width(),
            image.height()
        );
        Self { id, name, image }
    }

    pub fn solid(name: impl Into<String>, color: Color) -> Self {
        let image = RgbaImage::from_pixel(1, 1, Rgba([color.r, color.g, color.b, color.a]));
        Self::from_image(name, image)
    }

    /// Square checkerboard, handy for eyeballing UV mapping.
    pub fn checker(name: impl Into<String>, size: u32, cells: u32, a: Color, b: Color) -> Self {
        let size = size.max(1);
        let cell = (size / cells.max(1)).max(1);
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let c = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
            Rgba([c.r, c.g, c.b, c.a])
        });
        Self::from_image(name, image)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Nearest-neighbour lookup with repeat addressing.
    pub fn sample_nearest(&self, uv: Vec2) -> Color {
        let (w, h) = self.image.dimensions();
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * w as f32) as u32).min(w - 1);
        let y = ((v * h as f32) as u32).min(h - 1);
        let p = self.image.get_pixel(x, y);
        Color::new(p[0], p[1], p[2], p[3])
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Texture::solid("a", Color::WHITE);
        let b = Texture::solid("b", Color::WHITE);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn checker_sampling_wraps() {
        let tex = Texture::checker("checker", 4, 2, Color::WHITE, Color::BLACK);
        assert_eq!(tex.sample_nearest(Vec2::new(0.1, 0.1)), Color::WHITE);
        assert_eq!(tex.sample_nearest(Vec2::new(0.6, 0.1)), Color::BLACK);
        assert_eq!(tex.sample_nearest(Vec2::new(1.1, 1.1)), Color::WHITE);
    }
}
