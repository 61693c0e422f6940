use super::{
    resolve_capabilities, BackendError, BufferDescriptor, BufferHandle, BufferUsage,
    CapabilityRequest, Color, FrameStatus, RenderBackend, MAX_ACQUIRE_ATTEMPTS,
};
use crate::platform::NativeHandle;
use dodo_utils::{align, Pool};
use log::*;
use pollster::FutureExt;
use wgpu::{
    Adapter, Backends, Buffer, BufferUsages, CommandEncoder, CommandEncoderDescriptor, Device,
    DeviceDescriptor, Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference,
    Queue, RenderPassColorAttachment, RenderPassDescriptor, RequestAdapterOptions, StoreOp,
    Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture, TextureView,
    TextureViewDescriptor, COPY_BUFFER_ALIGNMENT,
};

/// Settings used to bring up a [`WgpuBackend`].
#[derive(Debug, Clone)]
pub struct WgpuBackendDescriptor {
    /// Allowed graphics APIs. The engine defaults to [`Backends::VULKAN`].
    pub backends: Backends,
    pub power_preference: PowerPreference,
    pub capabilities: Vec<CapabilityRequest>,
}

impl Default for WgpuBackendDescriptor {
    fn default() -> Self {
        Self {
            backends: Backends::VULKAN,
            power_preference: PowerPreference::HighPerformance,
            capabilities: vec![CapabilityRequest::optional(wgpu::Features::CLEAR_TEXTURE)],
        }
    }
}

/// Frame acquired in [`RenderBackend::begin_frame`], consumed by [`RenderBackend::present`].
struct PendingFrame {
    texture: SurfaceTexture,
    view: TextureView,
    encoder: CommandEncoder,
}

/// The wgpu renderer backend.
///
/// It must only be used from render commands. The surface, device and queue are created on the
/// main thread during engine startup, after that the backend is handed over to the render thread.
pub struct WgpuBackend {
    adapter: Adapter,
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    sconfig: SurfaceConfiguration,
    buffers: Pool<Buffer>,
    frame: Option<PendingFrame>,
    // Kept last, so that it's dropped after everything created through it
    _instance: Instance,
}

impl WgpuBackend {
    pub fn new(window: &NativeHandle, desc: &WgpuBackendDescriptor) -> Result<Self, BackendError> {
        let NativeHandle::Winit(window) = window else {
            return Err(BackendError::UnsupportedWindow);
        };

        info!("Starting up the wgpu backend...");

        let instance = Instance::new(InstanceDescriptor {
            backends: desc.backends,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: desc.power_preference,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .block_on()
            .ok_or(BackendError::NoAdapter)?;

        info!("Using adapter: {}", adapter.get_info().name);
        info!("Using backend: {:?}", adapter.get_info().backend);

        let features = resolve_capabilities(adapter.features(), &desc.capabilities)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Dodo device"),
                    required_features: features,
                    required_limits: Limits::default(),
                },
                None,
            )
            .block_on()?;

        device.on_uncaptured_error(Box::new(|error| {
            error!("An error has been reported by wgpu!");
            error!("{error}");
            panic!("Graphics API error: {error}");
        }));

        let size = window.inner_size();
        let sconfig = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or(BackendError::UnsupportedSurface)?;
        surface.configure(&device, &sconfig);

        Ok(Self {
            adapter,
            device,
            queue,
            surface,
            sconfig,
            buffers: Pool::new(),
            frame: None,
            _instance: instance,
        })
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    fn configure_surface(&mut self) {
        // An in-flight surface texture keeps the old swapchain alive
        self.frame = None;
        self.surface.configure(&self.device, &self.sconfig);
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn begin_frame(&mut self) -> Result<FrameStatus, BackendError> {
        if self.frame.take().is_some() {
            warn!("Frame started twice without a present, dropping the previous one");
        }

        // Notes on swapchain fetches:
        //  - Outdated and Lost aren't errors, the swapchain is reconfigured with the current
        //    size and the acquisition is retried.
        //  - On some GPUs on Linux under Mesa, Vulkan swapchains may randomly time out. The frame
        //    is skipped in hope that the issue is resolved next frame.
        //    Reference: https://github.com/gfx-rs/wgpu/issues/1218
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            match self.surface.get_current_texture() {
                Ok(texture) => {
                    let view = texture.texture.create_view(&TextureViewDescriptor {
                        label: Some("Framebuffer view"),
                        ..Default::default()
                    });
                    let encoder = self
                        .device
                        .create_command_encoder(&CommandEncoderDescriptor {
                            label: Some("Frame encoder"),
                        });

                    self.frame = Some(PendingFrame {
                        texture,
                        view,
                        encoder,
                    });
                    return Ok(FrameStatus::Ready);
                }

                Err(SurfaceError::Outdated | SurfaceError::Lost) => {
                    debug!("Swapchain out of date, recreating");
                    self.configure_surface();
                }

                Err(SurfaceError::Timeout) => {
                    warn!("Swapchain timed out, skipping the frame");
                    return Ok(FrameStatus::Skipped);
                }

                Err(error) => return Err(BackendError::Swapchain(error)),
            }
        }

        Ok(FrameStatus::Skipped)
    }

    fn clear(&mut self, color: Color) {
        let Some(frame) = self.frame.as_mut() else { return };

        let _pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Clear pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(wgpu::Color {
                        r: color.r,
                        g: color.g,
                        b: color.b,
                        a: color.a,
                    }),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    fn present(&mut self) -> Result<FrameStatus, BackendError> {
        let Some(frame) = self.frame.take() else {
            return Ok(FrameStatus::Skipped);
        };

        self.queue.submit(Some(frame.encoder.finish()));
        frame.texture.present();
        Ok(FrameStatus::Ready)
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        trace!("Resizing the surface to {width}x{height}");
        self.sconfig.width = width;
        self.sconfig.height = height;
        self.configure_surface();
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferHandle, BackendError> {
        let usage = match desc.usage {
            BufferUsage::Vertex => BufferUsages::VERTEX,
            BufferUsage::Index => BufferUsages::INDEX,
            BufferUsage::Uniform => BufferUsages::UNIFORM,
            BufferUsage::Storage => BufferUsages::STORAGE,
        };

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: align(desc.size.max(1), COPY_BUFFER_ALIGNMENT),
            usage: usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn upload_buffer_data(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let buffer = self
            .buffers
            .get(handle.0)
            .ok_or(BackendError::InvalidHandle(handle))?;

        // wgpu only accepts 4-byte aligned copies. The tail is padded with zeros.
        let size = data.len() as u64;
        let padded_size = align(size, COPY_BUFFER_ALIGNMENT);
        if offset % COPY_BUFFER_ALIGNMENT != 0
            || offset
                .checked_add(padded_size)
                .map_or(true, |end| end > buffer.size())
        {
            return Err(BackendError::OutOfBounds {
                offset,
                size,
                capacity: buffer.size(),
            });
        }

        if padded_size == size {
            self.queue.write_buffer(buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_size as usize, 0);
            self.queue.write_buffer(buffer, offset, &padded);
        }

        Ok(())
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(handle.0) {
            buffer.destroy();
        }
    }
}
