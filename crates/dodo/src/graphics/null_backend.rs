use super::{
    BackendError, BufferDescriptor, BufferHandle, Color, FrameStatus, RenderBackend,
    MAX_ACQUIRE_ATTEMPTS,
};
use dodo_utils::Pool;
use parking_lot::Mutex;
use std::sync::Arc;

/// A single call received by a [`NullBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendCall {
    BeginFrame,
    RecreateSwapchain,
    Clear(Color),
    Present,
    Resize { width: u32, height: u32 },
    CreateBuffer(BufferHandle),
    UploadBufferData { handle: BufferHandle, offset: u64, size: u64 },
    DestroyBuffer(BufferHandle),
}

/// Shared view into what a [`NullBackend`] did, usable after the backend was moved into a
/// [`super::SharedBackend`].
#[derive(Clone, Default)]
pub struct NullBackendProbe {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    buffers: Arc<Mutex<Pool<Vec<u8>>>>,
}

impl NullBackendProbe {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Amount of frames that were actually presented.
    pub fn presented_frames(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == BackendCall::Present)
            .count()
    }

    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.buffers.lock().get(handle.0).cloned()
    }
}

/// Backend that renders nothing. Every call is recorded, and buffers live in system memory.
///
/// It can also pretend that the swapchain goes out of date, to exercise the recreate-and-retry
/// path of [`RenderBackend::begin_frame`].
pub struct NullBackend {
    probe: NullBackendProbe,
    frame_open: bool,
    pending_outdated: usize,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            probe: NullBackendProbe::default(),
            frame_open: false,
            pending_outdated: 0,
        }
    }

    /// Makes the next `count` frame acquisitions report an out of date swapchain.
    pub fn with_outdated_frames(mut self, count: usize) -> Self {
        self.pending_outdated = count;
        self
    }

    pub fn probe(&self) -> NullBackendProbe {
        self.probe.clone()
    }

    fn record(&self, call: BackendCall) {
        self.probe.calls.lock().push(call);
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn begin_frame(&mut self) -> Result<FrameStatus, BackendError> {
        self.record(BackendCall::BeginFrame);
        self.frame_open = false;

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            if self.pending_outdated == 0 {
                self.frame_open = true;
                return Ok(FrameStatus::Ready);
            }
            self.pending_outdated -= 1;
            self.record(BackendCall::RecreateSwapchain);
        }

        Ok(FrameStatus::Skipped)
    }

    fn clear(&mut self, color: Color) {
        if self.frame_open {
            self.record(BackendCall::Clear(color));
        }
    }

    fn present(&mut self) -> Result<FrameStatus, BackendError> {
        if !self.frame_open {
            return Ok(FrameStatus::Skipped);
        }

        self.frame_open = false;
        self.record(BackendCall::Present);
        Ok(FrameStatus::Ready)
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.record(BackendCall::Resize { width, height });
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferHandle, BackendError> {
        let size = usize::try_from(desc.size).map_err(|_| BackendError::OutOfBounds {
            offset: 0,
            size: desc.size,
            capacity: 0,
        })?;

        let handle = BufferHandle(self.probe.buffers.lock().insert(vec![0; size]));
        self.record(BackendCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn upload_buffer_data(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        {
            let mut buffers = self.probe.buffers.lock();
            let buffer = buffers
                .get_mut(handle.0)
                .ok_or(BackendError::InvalidHandle(handle))?;

            let size = data.len() as u64;
            let capacity = buffer.len() as u64;
            if offset.checked_add(size).map_or(true, |end| end > capacity) {
                return Err(BackendError::OutOfBounds {
                    offset,
                    size,
                    capacity,
                });
            }

            let start = offset as usize;
            buffer[start..start + data.len()].copy_from_slice(data);
        }

        self.record(BackendCall::UploadBufferData {
            handle,
            offset,
            size: data.len() as u64,
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        let removed = self.probe.buffers.lock().remove(handle.0).is_some();
        if removed {
            self.record(BackendCall::DestroyBuffer(handle));
        }
    }
}
