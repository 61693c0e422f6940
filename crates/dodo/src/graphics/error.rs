use super::BufferHandle;
use thiserror::Error;

/// Errors reported by renderer backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("required renderer capability is not supported: {0:?}")]
    MissingCapability(wgpu::Features),
    #[error("the window can't be rendered to by this backend")]
    UnsupportedWindow,
    #[error("couldn't create the surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("couldn't create the device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("the surface is not supported by the adapter")]
    UnsupportedSurface,
    #[error("swapchain failure: {0}")]
    Swapchain(wgpu::SurfaceError),
    #[error("invalid buffer handle {0:?}")]
    InvalidHandle(BufferHandle),
    #[error("buffer write of {size} bytes at offset {offset} is out of bounds (buffer size {capacity})")]
    OutOfBounds { offset: u64, size: u64, capacity: u64 },
}
