//! Renderer API backends
//!
//! The render thread pipeline doesn't know anything about the graphics API. Backends implement
//! [`RenderBackend`] and are only ever touched from inside render commands, meaning that under
//! the multi-threaded policy only the render thread talks to the GPU.
//!
//! Two backends exist:
//!  * [`WgpuBackend`] - the real one, preferring Vulkan
//!  * [`NullBackend`] - headless, records every call, used by tests and `--headless` runs
//!
//! GPU objects are referred to with [`BufferHandle`]s, generation checked indices into a backend
//! owned pool. A stale handle can't be used to access a recycled object.

use dodo_utils::PoolHandle;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

#[doc(inline)]
pub use error::*;
mod error;

#[doc(inline)]
pub use null_backend::*;
mod null_backend;

#[doc(inline)]
pub use wgpu_backend::*;
mod wgpu_backend;

/// How many times a backend tries to acquire a frame, recreating the swapchain in between,
/// before giving up and skipping the frame.
pub(crate) const MAX_ACQUIRE_ATTEMPTS: usize = 2;

/// A backend shared between the engine and render commands.
pub type SharedBackend = Arc<Mutex<dyn RenderBackend>>;

/// Interface of a renderer API, as seen by render commands.
pub trait RenderBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Acquires the next frame. If the frame can't be rendered (for example because the
    /// swapchain was just recreated), [`FrameStatus::Skipped`] is returned, and all draws and the
    /// present of this frame become no-ops.
    fn begin_frame(&mut self) -> Result<FrameStatus, BackendError>;

    /// Clears the current frame with a color.
    fn clear(&mut self, color: Color);

    /// Submits the recorded frame and presents it. Returns [`FrameStatus::Skipped`] if there was
    /// no frame to present.
    fn present(&mut self) -> Result<FrameStatus, BackendError>;

    /// Reacts to window size changes.
    fn on_resize(&mut self, width: u32, height: u32);

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferHandle, BackendError>;

    /// Writes `data` into the buffer, starting at `offset` bytes.
    fn upload_buffer_data(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Destroys the buffer. Destroying a stale handle does nothing.
    fn destroy_buffer(&mut self, handle: BufferHandle);
}

/// Wraps a backend into a [`SharedBackend`].
pub fn share_backend(backend: impl RenderBackend + 'static) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was acquired and can be drawn to.
    Ready,
    /// The frame was dropped, nothing will be drawn or presented.
    Skipped,
}

impl FrameStatus {
    pub fn is_ready(self) -> bool {
        self == FrameStatus::Ready
    }
}

/// Linear RGBA color. Deserialized from a `[r, g, b, a]` array.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl From<[f64; 4]> for Color {
    fn from([r, g, b, a]: [f64; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

/// What a buffer is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Handle to a GPU buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) PoolHandle);

/// A renderer capability requested during backend creation.
///
/// A missing required capability fails the backend creation. A missing optional one is reported
/// with a warning and left disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRequest {
    pub feature: wgpu::Features,
    pub required: bool,
}

impl CapabilityRequest {
    pub const fn required(feature: wgpu::Features) -> Self {
        Self {
            feature,
            required: true,
        }
    }

    pub const fn optional(feature: wgpu::Features) -> Self {
        Self {
            feature,
            required: false,
        }
    }
}

/// Resolves capability requests against what the adapter supports. Returns the set of features
/// to enable.
pub fn resolve_capabilities(
    supported: wgpu::Features,
    requests: &[CapabilityRequest],
) -> Result<wgpu::Features, BackendError> {
    let mut enabled = wgpu::Features::empty();

    for request in requests {
        if supported.contains(request.feature) {
            enabled |= request.feature;
        } else if request.required {
            return Err(BackendError::MissingCapability(request.feature));
        } else {
            log::warn!(
                "Optional renderer capability {:?} is not supported, continuing without it",
                request.feature
            );
        }
    }

    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::Features;

    #[test]
    fn optional_capabilities_degrade() {
        let supported = Features::CLEAR_TEXTURE;
        let enabled = resolve_capabilities(
            supported,
            &[
                CapabilityRequest::required(Features::CLEAR_TEXTURE),
                CapabilityRequest::optional(Features::TEXTURE_COMPRESSION_BC),
            ],
        )
        .unwrap();

        assert_eq!(enabled, Features::CLEAR_TEXTURE);
    }

    #[test]
    fn missing_required_capability_fails() {
        let result = resolve_capabilities(
            Features::empty(),
            &[CapabilityRequest::required(
                Features::TEXTURE_COMPRESSION_BC,
            )],
        );

        assert!(matches!(
            result,
            Err(BackendError::MissingCapability(f)) if f == Features::TEXTURE_COMPRESSION_BC
        ));
    }

    #[test]
    fn color_from_array() {
        let color = Color::from([0.1, 0.2, 0.3, 1.0]);
        assert_eq!(color, Color::new(0.1, 0.2, 0.3, 1.0));
    }
}
