pub mod cache;
pub mod handle;
pub mod mesh;

pub use cache::AssetCache;
pub use handle::Handle;
pub use mesh::{Mesh, MeshMode, MeshValidationError};
