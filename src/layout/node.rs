use glam::{Mat4, Quat, Vec3};
use slotmap::new_key_type;

use super::observer::ObserverLists;
use crate::renderer::Color;

new_key_type! {
    /// Stable key of a node inside a [`LayoutTree`](super::LayoutTree).
    pub struct NodeKey;
}

/// Base depth extent of every node; children add their own extents on top.
pub const Z_EXTENT_BASE: f32 = 0.1;

/// Interpretation of a node's user size or user position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordinatesType {
    #[default]
    Absolute,
    /// Fraction of the parent's resolved size.
    RelativeToParent,
}

/// Aspect-ratio constraint for relatively sized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RatioMode {
    #[default]
    None,
    PanScan,
    Letterbox,
}

/// Observable state of one cached quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    Stale,
    Computing,
    Fresh,
}

/// Dirty flag plus re-entrancy guard for one lazily computed value.
///
/// `begin` clears the dirty flag before computing, so an invalidation that
/// lands mid-computation is kept and picked up by the next read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DirtyCell {
    dirty: bool,
    updating: bool,
}

impl DirtyCell {
    pub(crate) const fn stale() -> Self {
        Self {
            dirty: true,
            updating: false,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Returns false when the value is fresh or already being computed.
    pub(crate) fn begin(&mut self) -> bool {
        if !self.dirty || self.updating {
            return false;
        }
        self.dirty = false;
        self.updating = true;
        true
    }

    pub(crate) fn finish(&mut self) {
        self.updating = false;
    }

    pub(crate) fn state(&self) -> CacheState {
        if self.updating {
            CacheState::Computing
        } else if self.dirty {
            CacheState::Stale
        } else {
            CacheState::Fresh
        }
    }
}

pub(crate) struct LayoutNode {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    pub(crate) user_size: Vec3,
    pub(crate) user_position: Vec3,
    pub(crate) size_type: CoordinatesType,
    pub(crate) position_type: CoordinatesType,
    pub(crate) anchor: Vec3,
    pub(crate) ratio: f32,
    pub(crate) safe_area_ratio: f32,
    pub(crate) ratio_mode: RatioMode,
    pub(crate) auto_z: bool,
    pub(crate) rotation: Quat,
    pub(crate) scale: Vec3,
    pub(crate) visible: bool,
    pub(crate) color: Color,
    pub(crate) color_inherited: bool,

    pub(crate) size: Vec3,
    pub(crate) position: Vec3,
    pub(crate) world_matrix: Mat4,
    pub(crate) z_size: f32,

    pub(crate) size_cell: DirtyCell,
    pub(crate) position_cell: DirtyCell,
    pub(crate) world_cell: DirtyCell,
    pub(crate) z_size_cell: DirtyCell,
    pub(crate) z_order_cell: DirtyCell,

    pub(crate) observers: ObserverLists,
}

impl Default for LayoutNode {
    fn default() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            user_size: Vec3::ONE,
            user_position: Vec3::new(0.5, 0.5, 0.0),
            size_type: CoordinatesType::Absolute,
            position_type: CoordinatesType::RelativeToParent,
            anchor: Vec3::splat(0.5),
            ratio: 1.0,
            safe_area_ratio: 4.0 / 3.0,
            ratio_mode: RatioMode::None,
            auto_z: true,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            color: Color::WHITE,
            color_inherited: true,
            size: Vec3::ONE,
            position: Vec3::ZERO,
            world_matrix: Mat4::IDENTITY,
            z_size: Z_EXTENT_BASE,
            size_cell: DirtyCell::stale(),
            position_cell: DirtyCell::stale(),
            world_cell: DirtyCell::stale(),
            z_size_cell: DirtyCell::stale(),
            z_order_cell: DirtyCell::stale(),
            observers: ObserverLists::default(),
        }
    }
}

impl LayoutNode {
    pub(crate) fn invalidate_geometry(&mut self) {
        self.size_cell.invalidate();
        self.position_cell.invalidate();
        self.world_cell.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_cell_walks_stale_computing_fresh() {
        let mut cell = DirtyCell::stale();
        assert_eq!(cell.state(), CacheState::Stale);
        assert!(cell.begin());
        assert_eq!(cell.state(), CacheState::Computing);
        assert!(!cell.begin(), "re-entrant begin must be refused");
        cell.finish();
        assert_eq!(cell.state(), CacheState::Fresh);
        assert!(!cell.begin());
    }

    #[test]
    fn invalidation_during_compute_survives_finish() {
        let mut cell = DirtyCell::stale();
        assert!(cell.begin());
        cell.invalidate();
        cell.finish();
        assert_eq!(cell.state(), CacheState::Stale);
    }
}
