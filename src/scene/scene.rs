// scene/scene.rs
use std::borrow::Cow;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use hecs::World;

use super::components::*;
use crate::asset::{AssetCache, Handle, Mesh};
use crate::backend::RasterBackend;
use crate::layout::{LayoutTree, NodeKey};
use crate::renderer::{Color, Renderer};
use crate::scene::Camera;

/// Distance of the UI camera from the layout plane. Auto-Z stacking has to
/// stay below it for UI nodes to remain visible.
pub const UI_DEPTH: f32 = 100.0;

pub struct Scene {
    pub world: World,
    pub layout: LayoutTree,
    pub meshes: AssetCache<Mesh>,
    world_camera: Rc<Camera>,
    ui_camera: Rc<Camera>,
    world_root: NodeKey,
    ui_root: NodeKey,
    time: f64,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        let mut layout = LayoutTree::new();

        let world_root = layout.create_node();
        layout.set_position(world_root, Vec3::ZERO);
        layout.set_auto_z(world_root, false);

        let ui_root = layout.create_node();
        layout.set_position(ui_root, Vec3::ZERO);

        let mut scene = Self {
            world: World::new(),
            layout,
            meshes: AssetCache::new(),
            world_camera: Rc::new(Camera::default()),
            ui_camera: Rc::new(Camera::screen(1.0, 1.0, UI_DEPTH)),
            world_root,
            ui_root,
            time: 0.0,
        };
        scene.resize(width, height);
        scene
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn world_root(&self) -> NodeKey {
        self.world_root
    }

    /// Root of the UI tree; its size tracks the viewport in pixels.
    pub fn ui_root(&self) -> NodeKey {
        self.ui_root
    }

    pub fn world_camera(&self) -> &Rc<Camera> {
        &self.world_camera
    }

    pub fn set_world_camera(&mut self, camera: Camera) {
        self.world_camera = Rc::new(camera);
    }

    pub fn ui_camera(&self) -> &Rc<Camera> {
        &self.ui_camera
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        log::debug!("Scene viewport {}x{}", width, height);
        self.layout.set_size(self.ui_root, Vec3::new(w, h, 1.0));
        self.ui_camera = Rc::new(Camera::screen(w, h, UI_DEPTH).with_name("ui"));
        Rc::make_mut(&mut self.world_camera).set_aspect(w / h);
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> Handle<Mesh> {
        self.meshes.insert(mesh)
    }

    /// Destroys the entity together with its layout node.
    pub fn despawn(&mut self, entity: hecs::Entity) -> bool {
        let node = self.world.get::<&LayoutComponent>(entity).ok().map(|c| c.0);
        if self.world.despawn(entity).is_err() {
            return false;
        }
        if let Some(node) = node {
            self.layout.remove_node(node);
        }
        true
    }

    pub fn update(&mut self, dt: f64) {
        self.time += dt;
        self.system_rotate_animation(dt);
        self.system_pulse_animation();
        self.system_fade_animation();
    }

    /// Submits the world layer, flushes its translucent geometry, clears
    /// depth and repeats for the UI layer. The caller owns the frame
    /// boundaries (`begin_frame` / `end_frame`).
    pub fn render<B: RasterBackend>(&mut self, renderer: &mut Renderer<B>) {
        renderer.set_camera(self.world_camera.clone());
        self.draw_layer(renderer, Layer::World);
        renderer.render_transparent_meshes();

        renderer.clear_depth();
        renderer.set_camera(self.ui_camera.clone());
        self.draw_layer(renderer, Layer::Ui);
        renderer.render_transparent_meshes();
    }

    fn draw_layer<B: RasterBackend>(&mut self, renderer: &mut Renderer<B>, layer: Layer) {
        let drawables: Vec<_> = self
            .world
            .query::<(&LayoutComponent, &MeshComponent, &Layer, Option<&Visible>, Option<&Scissor>)>()
            .iter()
            .filter(|(_, (_, _, l, visible, _))| **l == layer && visible.map_or(true, |v| v.0))
            .map(|(_, (node, mesh, _, _, scissor))| (node.0, mesh.0, scissor.map(|s| s.0)))
            .collect();

        let previous_scissor = renderer.scissor();
        for (node, handle, scissor) in drawables {
            if !self.layout.contains(node) || !self.layout.world_visible(node) {
                continue;
            }
            let size = self.layout.size(node);
            let extent = Vec3::new(size.x, size.y, self.layout.user_size(node).z);
            let matrix = self.layout.world_transformation_matrix(node) * Mat4::from_scale(extent);
            let tint = self.layout.world_color(node);

            let Some(mesh) = self.meshes.get(handle) else {
                log::warn!("Layout node {:?} refers to a missing mesh {:?}", node, handle);
                continue;
            };
            let mesh = tinted(mesh, tint);

            renderer.set_scissor(scissor.unwrap_or(previous_scissor));
            renderer.push_matrix();
            renderer.load_matrix(matrix);
            renderer.draw_mesh(&mesh);
            renderer.pop_matrix();
        }
        renderer.set_scissor(previous_scissor);
    }

    fn system_rotate_animation(&mut self, dt: f64) {
        let updates: Vec<_> = self
            .world
            .query::<(&LayoutComponent, &RotateAnimation)>()
            .iter()
            .map(|(_, (node, anim))| (node.0, *anim))
            .collect();

        for (node, anim) in updates {
            if !self.layout.contains(node) {
                continue;
            }
            let delta = Quat::from_axis_angle(anim.axis.normalize_or_zero(), anim.speed * dt as f32);
            let rotation = (delta * self.layout.rotation(node)).normalize();
            self.layout.set_rotation(node, rotation);
        }
    }

    fn system_pulse_animation(&mut self) {
        let time = self.time as f32;
        let updates: Vec<_> = self
            .world
            .query::<(&LayoutComponent, &PulseAnimation)>()
            .iter()
            .map(|(_, (node, anim))| (node.0, anim.size_at(time)))
            .collect();

        for (node, size) in updates {
            if self.layout.contains(node) {
                self.layout.set_size(node, size);
            }
        }
    }

    fn system_fade_animation(&mut self) {
        let time = self.time as f32;
        let updates: Vec<_> = self
            .world
            .query::<(&LayoutComponent, &FadeAnimation)>()
            .iter()
            .map(|(_, (node, anim))| (node.0, anim.alpha_at(time)))
            .collect();

        for (node, alpha) in updates {
            if self.layout.contains(node) {
                let color = self.layout.color(node).with_alpha(alpha);
                self.layout.set_color(node, color);
            }
        }
    }
}

/// Per-draw copy of `mesh` carrying the node colour. Authored vertex
/// colours are modulated by the tint; uncoloured meshes get the first
/// material's diffuse modulated by the tint. The cached mesh is never touched.
fn tinted(mesh: &Mesh, tint: Color) -> Cow<'_, Mesh> {
    if tint == Color::WHITE {
        return Cow::Borrowed(mesh);
    }
    let colors = if mesh.has_colors() {
        mesh.colors().iter().map(|c| c.modulate(tint)).collect()
    } else {
        let color = mesh.material(0).diffuse_color.modulate(tint);
        vec![color; mesh.vertex_count()]
    };
    log::trace!("Tinting mesh '{}' with {:?}", mesh.name(), tint);
    let mut copy = mesh.clone();
    copy.set_colors(colors);
    Cow::Owned(copy)
}
