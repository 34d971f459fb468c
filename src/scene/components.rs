// scene/components.rs
// hecs components; geometry lives in the layout tree, entities point at it

use glam::Vec3;

use crate::asset::{Handle, Mesh};
use crate::layout::NodeKey;
use crate::renderer::ScissorRect;

/// Layout node that places this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutComponent(pub NodeKey);

#[derive(Debug, Clone, Copy)]
pub struct MeshComponent(pub Handle<Mesh>);

#[derive(Debug, Clone, Copy)]
pub struct Visible(pub bool);

impl Default for Visible {
    fn default() -> Self {
        Self(true)
    }
}

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Which camera draws the entity. The UI layer is drawn after the world
/// layer on a cleared depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    World,
    Ui,
}

/// Scissor applied while the entity's meshes are submitted.
#[derive(Debug, Clone, Copy)]
pub struct Scissor(pub ScissorRect);

// ============================================================================
// Animation Components
// ============================================================================

/// Spins the node about `axis` at `speed` radians per second.
#[derive(Debug, Clone, Copy)]
pub struct RotateAnimation {
    pub axis: Vec3,
    pub speed: f32,
}

/// Oscillates the node's user size around `base`.
#[derive(Debug, Clone, Copy)]
pub struct PulseAnimation {
    pub base: Vec3,
    pub amplitude: f32,
    pub speed: f32,
    pub phase: f32,
}

/// Oscillates the node's alpha between `min_alpha` and `max_alpha`.
#[derive(Debug, Clone, Copy)]
pub struct FadeAnimation {
    pub min_alpha: u8,
    pub max_alpha: u8,
    pub speed: f32,
    pub phase: f32,
}

impl FadeAnimation {
    pub fn alpha_at(&self, time: f32) -> u8 {
        let t = (time * self.speed + self.phase).sin() * 0.5 + 0.5;
        let (lo, hi) = (self.min_alpha as f32, self.max_alpha as f32);
        (lo + (hi - lo) * t).round().clamp(0.0, 255.0) as u8
    }
}

impl PulseAnimation {
    pub fn size_at(&self, time: f32) -> Vec3 {
        self.base * (1.0 + self.amplitude * (time * self.speed + self.phase).sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_stays_within_bounds() {
        let fade = FadeAnimation {
            min_alpha: 40,
            max_alpha: 200,
            speed: 3.0,
            phase: 0.25,
        };
        for step in 0..100 {
            let alpha = fade.alpha_at(step as f32 * 0.05);
            assert!((40..=200).contains(&alpha), "alpha {alpha} out of range");
        }
    }

    #[test]
    fn pulse_starts_at_base_without_phase() {
        let pulse = PulseAnimation {
            base: Vec3::new(2.0, 4.0, 1.0),
            amplitude: 0.5,
            speed: 1.0,
            phase: 0.0,
        };
        assert_eq!(pulse.size_at(0.0), Vec3::new(2.0, 4.0, 1.0));
    }
}
