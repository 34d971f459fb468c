use glam::{Mat4, Quat, Vec2, Vec3};
use log::{trace, warn};
use slotmap::SlotMap;

use super::node::{CacheState, CoordinatesType, LayoutNode, NodeKey, RatioMode, Z_EXTENT_BASE};
use super::observer::{LayoutEvent, Observer, SubscriptionId};
use crate::renderer::Color;
use crate::scene::Transform;

/// Arena of layout nodes.
///
/// Resolved values are pulled lazily: a read re-resolves what is stale
/// (parents first) and the resulting change notifications mark dependents
/// stale. Reads therefore take `&mut self`.
pub struct LayoutTree {
    nodes: SlotMap<NodeKey, LayoutNode>,
    next_subscription: u64,
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTree {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            next_subscription: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn create_node(&mut self) -> NodeKey {
        self.nodes.insert(LayoutNode::default())
    }

    /// Detaches `key` from its parent, orphans its children and frees it.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        let Some(parent) = self.nodes.get(key).map(|node| node.parent) else {
            return false;
        };
        if let Some(parent) = parent {
            self.remove_child(parent, key);
        }
        let children = std::mem::take(&mut self.nodes[key].children);
        for child in children {
            let node = &mut self.nodes[child];
            node.parent = None;
            node.observers.remove_links(key);
            node.invalidate_geometry();
        }
        self.nodes.remove(key);
        true
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|node| node.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Appends `child` under `parent`, re-parenting it if needed.
    /// Requests that would form a cycle are ignored.
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) {
        if !self.contains(parent) || !self.contains(child) {
            warn!("add_child on a removed node ignored");
            return;
        }
        if parent == child || self.is_ancestor(child, parent) {
            warn!("add_child would create a cycle; ignored");
            return;
        }
        if let Some(previous) = self.nodes[child].parent {
            if previous == parent {
                return;
            }
            self.remove_child(previous, child);
        }

        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.observers
            .list_mut(LayoutEvent::SizeChanged)
            .push(Observer::Parent(parent));
        node.invalidate_geometry();

        let observers = &mut self.nodes[parent].observers;
        observers
            .list_mut(LayoutEvent::SizeChanged)
            .push(Observer::Child(child));
        observers
            .list_mut(LayoutEvent::WorldMatrixChanged)
            .push(Observer::Child(child));

        self.invalidate_z_extent(parent);
    }

    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        let Some(index) = self
            .nodes
            .get(parent)
            .and_then(|node| node.children.iter().position(|&c| c == child))
        else {
            return false;
        };
        self.nodes[parent].children.remove(index);
        self.nodes[parent].observers.remove_links(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
            node.observers.remove_links(parent);
            node.invalidate_geometry();
        }
        self.invalidate_z_extent(parent);
        true
    }

    fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.parent(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    pub fn subscribe(
        &mut self,
        key: NodeKey,
        event: LayoutEvent,
        callback: impl FnMut(NodeKey) + 'static,
    ) -> Option<SubscriptionId> {
        let node = self.nodes.get_mut(key)?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        node.observers.list_mut(event).push(Observer::Callback {
            id,
            callback: Box::new(callback),
        });
        Some(id)
    }

    pub fn unsubscribe(&mut self, key: NodeKey, id: SubscriptionId) -> bool {
        self.nodes
            .get_mut(key)
            .map(|node| node.observers.remove_subscription(id))
            .unwrap_or(false)
    }

    pub fn observer_count(&self, key: NodeKey, event: LayoutEvent) -> usize {
        self.nodes
            .get(key)
            .map(|node| node.observers.list(event).len())
            .unwrap_or(0)
    }

    /// Number of parent/child links held by `key`, callbacks excluded.
    pub fn link_count(&self, key: NodeKey) -> usize {
        self.nodes
            .get(key)
            .map(|node| node.observers.link_count())
            .unwrap_or(0)
    }

    pub fn cache_state(&self, key: NodeKey, event: LayoutEvent) -> Option<CacheState> {
        let node = self.nodes.get(key)?;
        Some(match event {
            LayoutEvent::SizeChanged => node.size_cell.state(),
            LayoutEvent::PositionChanged => node.position_cell.state(),
            LayoutEvent::WorldMatrixChanged => node.world_cell.state(),
        })
    }

    // --- authored properties -------------------------------------------

    fn edit(&mut self, key: NodeKey, apply: impl FnOnce(&mut LayoutNode) -> bool) {
        match self.nodes.get_mut(key) {
            Some(node) => {
                if apply(node) {
                    node.world_cell.invalidate();
                }
            }
            None => warn!("layout edit on a removed node ignored"),
        }
    }

    pub fn set_size(&mut self, key: NodeKey, size: Vec3) {
        self.edit(key, |node| {
            if node.user_size == size {
                return false;
            }
            node.user_size = size;
            node.invalidate_geometry();
            true
        });
    }

    pub fn set_position(&mut self, key: NodeKey, position: Vec3) {
        self.edit(key, |node| {
            if node.user_position == position {
                return false;
            }
            node.user_position = position;
            node.position_cell.invalidate();
            true
        });
    }

    pub fn set_size_type(&mut self, key: NodeKey, size_type: CoordinatesType) {
        self.edit(key, |node| {
            if node.size_type == size_type {
                return false;
            }
            node.size_type = size_type;
            node.invalidate_geometry();
            true
        });
    }

    pub fn set_position_type(&mut self, key: NodeKey, position_type: CoordinatesType) {
        self.edit(key, |node| {
            if node.position_type == position_type {
                return false;
            }
            node.position_type = position_type;
            node.position_cell.invalidate();
            true
        });
    }

    pub fn set_anchor(&mut self, key: NodeKey, anchor: Vec3) {
        self.edit(key, |node| {
            if node.anchor == anchor {
                return false;
            }
            node.anchor = anchor;
            node.position_cell.invalidate();
            true
        });
    }

    pub fn set_ratio(&mut self, key: NodeKey, ratio: f32) {
        self.edit(key, |node| {
            if node.ratio == ratio {
                return false;
            }
            node.ratio = ratio;
            node.invalidate_geometry();
            true
        });
    }

    pub fn set_safe_area_ratio(&mut self, key: NodeKey, ratio: f32) {
        self.edit(key, |node| {
            if node.safe_area_ratio == ratio {
                return false;
            }
            node.safe_area_ratio = ratio;
            node.invalidate_geometry();
            true
        });
    }

    pub fn set_ratio_mode(&mut self, key: NodeKey, mode: RatioMode) {
        self.edit(key, |node| {
            if node.ratio_mode == mode {
                return false;
            }
            node.ratio_mode = mode;
            node.invalidate_geometry();
            true
        });
    }

    /// When enabled, children receive stacked z-positions in insertion order.
    pub fn set_auto_z(&mut self, key: NodeKey, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            if node.auto_z != enabled {
                node.auto_z = enabled;
                node.z_order_cell.invalidate();
            }
        }
    }

    pub fn set_rotation(&mut self, key: NodeKey, rotation: Quat) {
        self.edit(key, |node| {
            let changed = node.rotation != rotation;
            node.rotation = rotation;
            changed
        });
    }

    pub fn set_scale(&mut self, key: NodeKey, scale: Vec3) {
        self.edit(key, |node| {
            let changed = node.scale != scale;
            node.scale = scale;
            changed
        });
    }

    /// Visibility and colour feed no cached quantity, so these setters only
    /// report whether the value changed.
    fn edit_display(&mut self, key: NodeKey, apply: impl FnOnce(&mut LayoutNode) -> bool) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => apply(node),
            None => {
                warn!("layout edit on a removed node ignored");
                false
            }
        }
    }

    pub fn set_visible(&mut self, key: NodeKey, visible: bool) -> bool {
        self.edit_display(key, |node| {
            let changed = node.visible != visible;
            node.visible = visible;
            changed
        })
    }

    pub fn set_color(&mut self, key: NodeKey, color: Color) -> bool {
        self.edit_display(key, |node| {
            let changed = node.color != color;
            node.color = color;
            changed
        })
    }

    pub fn set_color_inherited(&mut self, key: NodeKey, inherited: bool) -> bool {
        self.edit_display(key, |node| {
            let changed = node.color_inherited != inherited;
            node.color_inherited = inherited;
            changed
        })
    }

    pub fn user_size(&self, key: NodeKey) -> Vec3 {
        self.nodes.get(key).map(|n| n.user_size).unwrap_or(Vec3::ZERO)
    }

    pub fn user_position(&self, key: NodeKey) -> Vec3 {
        self.nodes
            .get(key)
            .map(|n| n.user_position)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn anchor(&self, key: NodeKey) -> Vec3 {
        self.nodes.get(key).map(|n| n.anchor).unwrap_or(Vec3::ZERO)
    }

    pub fn size_type(&self, key: NodeKey) -> CoordinatesType {
        self.nodes.get(key).map(|n| n.size_type).unwrap_or_default()
    }

    pub fn position_type(&self, key: NodeKey) -> CoordinatesType {
        self.nodes
            .get(key)
            .map(|n| n.position_type)
            .unwrap_or_default()
    }

    pub fn ratio_mode(&self, key: NodeKey) -> RatioMode {
        self.nodes.get(key).map(|n| n.ratio_mode).unwrap_or_default()
    }

    pub fn auto_z(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(|n| n.auto_z)
    }

    pub fn rotation(&self, key: NodeKey) -> Quat {
        self.nodes
            .get(key)
            .map(|n| n.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    pub fn scale(&self, key: NodeKey) -> Vec3 {
        self.nodes.get(key).map(|n| n.scale).unwrap_or(Vec3::ONE)
    }

    pub fn visible(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(|n| n.visible)
    }

    pub fn color(&self, key: NodeKey) -> Color {
        self.nodes.get(key).map(|n| n.color).unwrap_or_default()
    }

    // --- resolved values -----------------------------------------------

    /// Resolved size; z is the node's depth extent.
    pub fn size(&mut self, key: NodeKey) -> Vec3 {
        if !self.contains(key) {
            return Vec3::ZERO;
        }
        self.update_size(key);
        self.nodes[key].size
    }

    pub fn x_size(&mut self, key: NodeKey) -> f32 {
        self.size(key).x
    }

    pub fn y_size(&mut self, key: NodeKey) -> f32 {
        self.size(key).y
    }

    pub fn z_size(&mut self, key: NodeKey) -> f32 {
        if !self.contains(key) {
            return 0.0;
        }
        self.update_z_size(key);
        self.nodes[key].z_size
    }

    /// Resolved position in the parent's local space.
    pub fn position(&mut self, key: NodeKey) -> Vec3 {
        if !self.contains(key) {
            return Vec3::ZERO;
        }
        self.update_position(key);
        self.nodes[key].position
    }

    pub fn world_transformation_matrix(&mut self, key: NodeKey) -> Mat4 {
        if !self.contains(key) {
            return Mat4::IDENTITY;
        }
        self.update_world_matrix(key);
        self.nodes[key].world_matrix
    }

    /// Visible only if the node and all of its ancestors are visible.
    pub fn world_visible(&self, key: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            match self.nodes.get(k) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Node color modulated by every ancestor up to the first one that does
    /// not inherit.
    pub fn world_color(&self, key: NodeKey) -> Color {
        let Some(node) = self.nodes.get(key) else {
            return Color::WHITE;
        };
        let mut color = node.color;
        let mut inherits = node.color_inherited;
        let mut current = node.parent;
        while let (true, Some(k)) = (inherits, current) {
            let parent = &self.nodes[k];
            color = color.modulate(parent.color);
            inherits = parent.color_inherited;
            current = parent.parent;
        }
        color
    }

    /// Whether a world-space point falls inside the node's rectangle.
    pub fn contains_point(&mut self, key: NodeKey, point: Vec3) -> bool {
        let world = self.world_transformation_matrix(key);
        if world.determinant().abs() <= f32::EPSILON {
            return false;
        }
        let half = self.size(key).truncate() * 0.5;
        let local = world.inverse().transform_point3(point);
        local.x.abs() <= half.x && local.y.abs() <= half.y
    }

    // --- resolution ----------------------------------------------------

    fn update_z_size(&mut self, key: NodeKey) {
        if !self.nodes[key].z_size_cell.begin() {
            return;
        }
        let mut total = Z_EXTENT_BASE;
        for i in 0..self.nodes[key].children.len() {
            let child = self.nodes[key].children[i];
            self.update_z_size(child);
            total += self.nodes[child].z_size;
        }
        let node = &mut self.nodes[key];
        node.z_size_cell.finish();
        if node.z_size != total {
            node.z_size = total;
            node.size_cell.invalidate();
        }
    }

    /// Stacks the children of an auto-z node along +Z.
    fn update_z(&mut self, key: NodeKey) {
        if !self.nodes[key].auto_z || !self.nodes[key].z_order_cell.begin() {
            return;
        }
        let mut z = Z_EXTENT_BASE;
        for i in 0..self.nodes[key].children.len() {
            let child = self.nodes[key].children[i];
            let node = &mut self.nodes[child];
            if node.user_position.z != z {
                node.user_position.z = z;
                node.position_cell.invalidate();
                node.world_cell.invalidate();
            }
            self.update_z_size(child);
            z += self.nodes[child].z_size;
        }
        self.nodes[key].z_order_cell.finish();
    }

    fn update_size(&mut self, key: NodeKey) {
        let (parent, size_type) = {
            let node = &self.nodes[key];
            (node.parent, node.size_type)
        };
        let parent = parent.filter(|_| size_type == CoordinatesType::RelativeToParent);
        if let Some(parent) = parent {
            self.update_size(parent);
        }
        self.update_z_size(key);
        if !self.nodes[key].size_cell.begin() {
            return;
        }

        let parent_size = parent.map(|p| self.nodes[p].size.truncate());
        let node = &mut self.nodes[key];
        let extent = match size_type {
            CoordinatesType::Absolute => node.user_size.truncate().abs(),
            CoordinatesType::RelativeToParent => match parent_size {
                Some(parent_size) => relative_size(
                    node.user_size.truncate(),
                    parent_size,
                    node.ratio,
                    node.safe_area_ratio,
                    node.ratio_mode,
                ),
                None => Vec2::ZERO,
            },
        };
        let size = extent.extend(node.z_size);
        node.size_cell.finish();
        if size != node.size {
            trace!("layout node {key:?} size {:?} -> {size:?}", node.size);
            node.size = size;
            node.position_cell.invalidate();
            node.world_cell.invalidate();
            self.notify(key, LayoutEvent::SizeChanged);
        }
    }

    fn update_position(&mut self, key: NodeKey) {
        let (parent, position_type) = {
            let node = &self.nodes[key];
            (node.parent, node.position_type)
        };
        if let Some(parent) = parent {
            self.update_z(parent);
            if position_type == CoordinatesType::RelativeToParent {
                self.update_size(parent);
            }
        }
        self.update_size(key);
        if !self.nodes[key].position_cell.begin() {
            return;
        }

        let parent_size = parent
            .filter(|_| position_type == CoordinatesType::RelativeToParent)
            .map(|p| self.nodes[p].size.truncate());
        let node = &mut self.nodes[key];
        let position = match parent_size {
            Some(parent_size) => {
                let offset = (node.user_position.truncate() - Vec2::splat(0.5)) * parent_size;
                let anchor_shift = (Vec2::splat(0.5) - node.anchor.truncate()) * node.size.truncate();
                (offset + anchor_shift).extend(node.user_position.z)
            }
            None => node.user_position,
        };
        node.position_cell.finish();
        if position != node.position {
            trace!("layout node {key:?} position {:?} -> {position:?}", node.position);
            node.position = position;
            node.world_cell.invalidate();
            self.notify(key, LayoutEvent::PositionChanged);
        }
    }

    fn update_world_matrix(&mut self, key: NodeKey) {
        let parent = self.nodes[key].parent;
        if let Some(parent) = parent {
            self.update_world_matrix(parent);
        }
        self.update_position(key);
        if !self.nodes[key].world_cell.begin() {
            return;
        }

        let parent_world = parent
            .map(|p| self.nodes[p].world_matrix)
            .unwrap_or(Mat4::IDENTITY);
        let node = &mut self.nodes[key];
        let local = Transform::from_trs(node.position, node.rotation, node.scale);
        let world = Transform::compose(parent_world, &local);
        node.world_cell.finish();
        if world != node.world_matrix {
            node.world_matrix = world;
            self.notify(key, LayoutEvent::WorldMatrixChanged);
        }
    }

    fn notify(&mut self, key: NodeKey, event: LayoutEvent) {
        // Taken out so the parent/child handlers can borrow `self` mutably.
        let mut observers = std::mem::take(self.nodes[key].observers.list_mut(event));
        for observer in observers.iter_mut() {
            match observer {
                Observer::Parent(parent) => self.on_child_size_changed(*parent),
                Observer::Child(child) => match event {
                    LayoutEvent::SizeChanged => self.on_parent_size_changed(*child),
                    LayoutEvent::WorldMatrixChanged => self.on_parent_world_changed(*child),
                    LayoutEvent::PositionChanged => {}
                },
                Observer::Callback { callback, .. } => callback(key),
            }
        }
        let list = self.nodes[key].observers.list_mut(event);
        observers.append(list);
        *list = observers;
    }

    fn on_child_size_changed(&mut self, parent: NodeKey) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.z_size_cell.invalidate();
            node.z_order_cell.invalidate();
            node.size_cell.invalidate();
        }
    }

    fn on_parent_size_changed(&mut self, child: NodeKey) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.invalidate_geometry();
        }
    }

    fn on_parent_world_changed(&mut self, child: NodeKey) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.world_cell.invalidate();
        }
    }

    /// Structural change below `key`: every ancestor's depth extent is stale.
    fn invalidate_z_extent(&mut self, key: NodeKey) {
        let mut current = Some(key);
        while let Some(k) = current {
            let node = &mut self.nodes[k];
            node.z_size_cell.invalidate();
            node.z_order_cell.invalidate();
            node.size_cell.invalidate();
            current = node.parent;
        }
    }

    #[cfg(test)]
    pub(crate) fn force_computing(&mut self, key: NodeKey) {
        let cell = &mut self.nodes[key].size_cell;
        cell.invalidate();
        cell.begin();
    }

    #[cfg(test)]
    pub(crate) fn finish_computing(&mut self, key: NodeKey) {
        self.nodes[key].size_cell.finish();
    }
}

/// Relative size of a node constrained by its aspect-ratio mode.
pub fn relative_size(
    user_size: Vec2,
    parent_size: Vec2,
    ratio: f32,
    safe_area_ratio: f32,
    mode: RatioMode,
) -> Vec2 {
    let mut size = user_size * parent_size;
    if size.x <= 0.0 || size.y <= 0.0 || ratio <= 0.0 || safe_area_ratio <= 0.0 {
        return size;
    }
    let current = size.x / size.y;
    match mode {
        RatioMode::None => {}
        RatioMode::PanScan => {
            if safe_area_ratio <= current {
                size.x = ratio * size.y;
            } else {
                size.x = (1.0 - (safe_area_ratio - current) / safe_area_ratio) * ratio * size.y;
            }
        }
        RatioMode::Letterbox => {
            if ratio < current {
                size.x = ratio * size.y;
            } else {
                size.y = size.x / ratio;
            }
        }
    }
    size
}
