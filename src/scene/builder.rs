// scene/builder.rs
// Creates a layout node and its entity together

use glam::{Quat, Vec3};

use super::components::*;
use super::Scene;
use crate::asset::{Handle, Mesh};
use crate::layout::{CoordinatesType, NodeKey, RatioMode};
use crate::renderer::{Color, ScissorRect};

/// Fluent builder for a layout node plus the hecs entity that draws it.
/// The node is attached to `parent` as soon as the builder is created.
pub struct SpriteBuilder<'s> {
    scene: &'s mut Scene,
    node: NodeKey,
    builder: hecs::EntityBuilder,
}

impl<'s> SpriteBuilder<'s> {
    pub fn new(scene: &'s mut Scene, parent: NodeKey, layer: Layer) -> Self {
        let node = scene.layout.create_node();
        scene.layout.add_child(parent, node);
        let mut builder = hecs::EntityBuilder::new();
        builder.add(LayoutComponent(node)).add(layer);
        Self {
            scene,
            node,
            builder,
        }
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.builder.add(Name::new(name));
        self
    }

    pub fn with_mesh(mut self, mesh: Handle<Mesh>) -> Self {
        self.builder.add(MeshComponent(mesh));
        self
    }

    pub fn with_size(self, size: Vec3, size_type: CoordinatesType) -> Self {
        self.scene.layout.set_size_type(self.node, size_type);
        self.scene.layout.set_size(self.node, size);
        self
    }

    pub fn with_position(self, position: Vec3, position_type: CoordinatesType) -> Self {
        self.scene.layout.set_position_type(self.node, position_type);
        self.scene.layout.set_position(self.node, position);
        self
    }

    pub fn with_anchor(self, anchor: Vec3) -> Self {
        self.scene.layout.set_anchor(self.node, anchor);
        self
    }

    /// Constrains a relative size to `ratio` (width / height).
    pub fn with_ratio(self, mode: RatioMode, ratio: f32) -> Self {
        self.scene.layout.set_ratio_mode(self.node, mode);
        self.scene.layout.set_ratio(self.node, ratio);
        self
    }

    pub fn with_auto_z(self, enabled: bool) -> Self {
        self.scene.layout.set_auto_z(self.node, enabled);
        self
    }

    pub fn with_rotation(self, rotation: Quat) -> Self {
        self.scene.layout.set_rotation(self.node, rotation);
        self
    }

    pub fn with_color(self, color: Color) -> Self {
        self.scene.layout.set_color(self.node, color);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.builder.add(Visible(visible));
        self
    }

    pub fn with_scissor(mut self, scissor: ScissorRect) -> Self {
        self.builder.add(Scissor(scissor));
        self
    }

    pub fn with_rotation_animation(mut self, axis: Vec3, speed: f32) -> Self {
        self.builder.add(RotateAnimation { axis, speed });
        self
    }

    pub fn with_pulse_animation(mut self, amplitude: f32, speed: f32, phase: f32) -> Self {
        let base = self.scene.layout.user_size(self.node);
        self.builder.add(PulseAnimation {
            base,
            amplitude,
            speed,
            phase,
        });
        self
    }

    pub fn with_fade_animation(mut self, min_alpha: u8, max_alpha: u8, speed: f32, phase: f32) -> Self {
        self.builder.add(FadeAnimation {
            min_alpha,
            max_alpha,
            speed,
            phase,
        });
        self
    }

    pub fn spawn(mut self) -> (hecs::Entity, NodeKey) {
        let entity = self.scene.world.spawn(self.builder.build());
        (entity, self.node)
    }
}
