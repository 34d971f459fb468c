// scene/mod.rs

pub mod builder;
pub mod camera;
pub mod components;
pub mod demo;
pub mod scene;
pub mod transform;

pub use builder::SpriteBuilder;
pub use camera::{Camera, DepthMetric, OrthoBounds, ProjectionType};
pub use scene::{Scene, UI_DEPTH};
pub use transform::Transform;

pub use components::{
    FadeAnimation, Layer, LayoutComponent, MeshComponent, Name, PulseAnimation, RotateAnimation,
    Scissor, Visible,
};
