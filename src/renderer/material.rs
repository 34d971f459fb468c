// renderer/material.rs

use std::rc::Rc;

use bitflags::bitflags;

use super::{Color, Texture};

/// How a material composites against what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialMode {
    #[default]
    Opaque,
    AlphaBlend,
    /// Cut-out: fragments below half alpha are discarded.
    AlphaTest,
}

/// Fixed-function texture combine mode carried per mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexEnvMode {
    /// texture * colour
    #[default]
    Modulate,
    /// texture only
    Replace,
    /// texture rgb blended over colour by texture alpha, colour alpha kept
    Decal,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const ENABLE_LIGHTS = 1 << 0;
        /// Shadow receivers are always composited as opaque geometry.
        const SHADOW_TEXTURE = 1 << 1;
        const DOUBLE_SIDED = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub diffuse_color: Color,
    pub ambient_color: Color,
    pub specular_color: Color,
    pub emission_color: Color,
    pub shininess: f32,
    pub mode: MaterialMode,
    pub flags: MaterialFlags,
    pub texture: Option<Rc<Texture>>,
}

impl Material {
    pub fn new(color: Color) -> Self {
        Self {
            diffuse_color: color,
            ambient_color: Color::new(51, 51, 51, 255),
            specular_color: Color::BLACK,
            emission_color: Color::BLACK,
            shininess: 0.0,
            mode: MaterialMode::Opaque,
            flags: MaterialFlags::empty(),
            texture: None,
        }
    }

    pub fn white() -> Self {
        Self::new(Color::WHITE)
    }

    /// Alpha-blended material with the given diffuse colour.
    pub fn translucent(color: Color) -> Self {
        Self::new(color).with_mode(MaterialMode::AlphaBlend)
    }

    pub fn with_mode(mut self, mode: MaterialMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn is_shadow_texture(&self) -> bool {
        self.flags.contains(MaterialFlags::SHADOW_TEXTURE)
    }

    /// True for every mode other than fully opaque.
    pub fn requires_blending(&self) -> bool {
        self.mode != MaterialMode::Opaque
    }

    /// Texture identity, not texture contents.
    pub fn same_texture(&self, other: &Self) -> bool {
        match (&self.texture, &other.texture) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.diffuse_color == other.diffuse_color
            && self.ambient_color == other.ambient_color
            && self.specular_color == other.specular_color
            && self.emission_color == other.emission_color
            && self.shininess == other.shininess
            && self.mode == other.mode
            && self.flags == other.flags
            && self.same_texture(other)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::white()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_texture_identity() {
        let a = Rc::new(Texture::solid("a", Color::WHITE));
        let b = Rc::new(Texture::solid("b", Color::WHITE));

        let m1 = Material::white().with_texture(a.clone());
        let m2 = Material::white().with_texture(a);
        let m3 = Material::white().with_texture(b);

        assert_eq!(m1, m2);
        assert_ne!(m1, m3);
        assert_ne!(m1, Material::white());
    }

    #[test]
    fn only_opaque_mode_skips_blending() {
        assert!(!Material::white().requires_blending());
        assert!(Material::translucent(Color::WHITE).requires_blending());
        assert!(Material::white()
            .with_mode(MaterialMode::AlphaTest)
            .requires_blending());
    }

    #[test]
    fn shadow_flag_is_reported() {
        let m = Material::white().with_flags(MaterialFlags::SHADOW_TEXTURE);
        assert!(m.is_shadow_texture());
        assert!(!Material::white().is_shadow_texture());
    }
}
