//! Hierarchical 2D/3D layout with lazily resolved sizes and positions.

mod node;
mod observer;
mod tree;

pub use node::{CacheState, CoordinatesType, NodeKey, RatioMode, Z_EXTENT_BASE};
pub use observer::{LayoutEvent, SubscriptionId};
pub use tree::{relative_size, LayoutTree};
