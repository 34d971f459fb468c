pub mod color;
pub mod material;
pub mod primitives;
mod renderer;
pub mod texture;
pub mod transparent;

pub use color::Color;
pub use material::{Material, MaterialFlags, MaterialMode, TexEnvMode};
pub use primitives::{cube_mesh, quad_mesh, quad_strip_mesh};
pub use renderer::{FrameStats, Renderer, ScissorRect};
pub use texture::Texture;
pub use transparent::{z_order, SubmitState, TransparentEntry, TransparentQueue};
