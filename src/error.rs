use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendKind;

/// Failures while constructing or driving a raster backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend {kind:?} cannot drive a {target} target")]
    Unsupported { kind: BackendKind, target: &'static str },
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface has no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),
    #[error("failed to write {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Top-level launcher failures.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
