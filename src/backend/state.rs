use std::rc::Rc;

use glam::Mat4;

use super::MaterialBinding;
use crate::renderer::{Color, MaterialMode, ScissorRect, TexEnvMode, Texture};

/// Snapshot of a [`MaterialBinding`] that outlives the borrowed material.
#[derive(Debug, Clone)]
pub struct BoundMaterial {
    pub diffuse: Color,
    pub texture: Option<Rc<Texture>>,
    pub tex_env_mode: TexEnvMode,
    pub has_color: bool,
    pub alpha_blend: bool,
    pub alpha_test: bool,
}

impl BoundMaterial {
    pub fn from_binding(binding: &MaterialBinding<'_>) -> Self {
        Self {
            diffuse: binding.material.diffuse_color,
            texture: binding.material.texture.clone(),
            tex_env_mode: binding.tex_env_mode,
            has_color: binding.has_color,
            alpha_blend: binding.alpha_blend,
            alpha_test: binding.material.mode == MaterialMode::AlphaTest,
        }
    }

    /// Colour before texturing: the vertex colour when the draw carries one.
    pub fn base_color(&self, vertex: Option<Color>) -> Color {
        match (self.has_color, vertex) {
            (true, Some(color)) => color,
            _ => self.diffuse,
        }
    }
}

impl Default for BoundMaterial {
    fn default() -> Self {
        Self {
            diffuse: Color::WHITE,
            texture: None,
            tex_env_mode: TexEnvMode::Modulate,
            has_color: false,
            alpha_blend: false,
            alpha_test: false,
        }
    }
}

/// Immediate-mode state shared by both rasterizers.
#[derive(Debug, Clone, Default)]
pub struct FixedFunctionState {
    pub view_proj: Mat4,
    pub model: Mat4,
    pub scissor: ScissorRect,
    pub material: Option<BoundMaterial>,
}

impl FixedFunctionState {
    pub fn mvp(&self) -> Mat4 {
        self.view_proj * self.model
    }

    pub fn material(&self) -> BoundMaterial {
        match &self.material {
            Some(material) => material.clone(),
            None => {
                log::trace!("draw without a bound material; using white");
                BoundMaterial::default()
            }
        }
    }
}

/// Texture environment combine of a base colour and an optional texel.
pub fn shade(mode: TexEnvMode, base: Color, texel: Option<Color>) -> Color {
    let Some(texel) = texel else {
        return base;
    };
    match mode {
        TexEnvMode::Modulate => base.modulate(texel),
        TexEnvMode::Replace => texel,
        TexEnvMode::Decal => {
            let t = texel.a as u32;
            let mix = |b: u8, x: u8| ((b as u32 * (255 - t) + x as u32 * t + 127) / 255) as u8;
            Color::new(
                mix(base.r, texel.r),
                mix(base.g, texel.g),
                mix(base.b, texel.b),
                base.a,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Material;

    #[test]
    fn modulate_multiplies_channels() {
        let out = shade(
            TexEnvMode::Modulate,
            Color::new(255, 128, 0, 255),
            Some(Color::new(128, 255, 255, 128)),
        );
        assert_eq!(out, Color::new(128, 128, 0, 128));
    }

    #[test]
    fn replace_ignores_base() {
        let texel = Color::new(1, 2, 3, 4);
        assert_eq!(shade(TexEnvMode::Replace, Color::WHITE, Some(texel)), texel);
    }

    #[test]
    fn decal_keeps_base_alpha() {
        let out = shade(
            TexEnvMode::Decal,
            Color::new(0, 0, 0, 77),
            Some(Color::new(255, 255, 255, 255)),
        );
        assert_eq!(out, Color::new(255, 255, 255, 77));
    }

    #[test]
    fn untextured_returns_base() {
        let base = Color::new(9, 8, 7, 6);
        assert_eq!(shade(TexEnvMode::Decal, base, None), base);
    }

    #[test]
    fn vertex_colour_only_when_flagged() {
        let material = Material::new(Color::new(10, 20, 30, 255));
        let mut bound = BoundMaterial::from_binding(&MaterialBinding {
            material: &material,
            tex_env_mode: TexEnvMode::Modulate,
            has_color: false,
            alpha_blend: false,
        });
        let vertex = Some(Color::new(200, 0, 0, 255));
        assert_eq!(bound.base_color(vertex), material.diffuse_color);
        bound.has_color = true;
        assert_eq!(bound.base_color(vertex), Color::new(200, 0, 0, 255));
    }
}
