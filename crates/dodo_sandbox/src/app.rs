use dodo::{
    engine::{Application, EngineContext, FrameInfo},
    graphics::{BufferDescriptor, BufferHandle, BufferUsage, Color},
    platform::WindowEvent,
};
use dodo_utils::{ok, pack_floats, AnyResult, AnyhowResultExt};
use log::*;
use std::time::Duration;

/// Frame uniforms: time, delta, width, height.
const FRAME_UNIFORMS_SIZE: u64 = 4 * 4;

/// Demo application. Pulses the clear color and streams a small uniform buffer every frame.
pub struct SandboxApp {
    base_color: Color,
    frame_uniforms: Option<BufferHandle>,
}

impl SandboxApp {
    pub fn new(base_color: Color) -> Self {
        Self {
            base_color,
            frame_uniforms: None,
        }
    }

    fn clear_color(&self, frame: &FrameInfo) -> Color {
        let pulse = (frame.time.as_secs_f64().sin() * 0.5 + 0.5) * 0.2;
        Color::new(
            (self.base_color.r + pulse).min(1.0),
            self.base_color.g,
            (self.base_color.b + pulse).min(1.0),
            self.base_color.a,
        )
    }
}

impl Application for SandboxApp {
    fn label(&self) -> &'static str {
        "Sandbox"
    }

    fn init(&mut self, ec: &mut EngineContext) -> AnyResult {
        let handle = ec
            .execute_sync(|backend| {
                backend.create_buffer(&BufferDescriptor {
                    label: Some(String::from("Frame uniforms")),
                    size: FRAME_UNIFORMS_SIZE,
                    usage: BufferUsage::Uniform,
                })
            })
            .otherwise("couldn't create the frame uniform buffer")?;

        self.frame_uniforms = Some(handle);
        ok()
    }

    fn on_event(&mut self, _ec: &mut EngineContext, event: &WindowEvent) {
        if let WindowEvent::Resized { width, height } = event {
            debug!("Sandbox viewport is now {width}x{height}");
        }
    }

    fn frame(&mut self, ec: &mut EngineContext, frame: &FrameInfo) {
        let color = self.clear_color(frame);
        ec.submit(move |backend| backend.clear(color));

        if let Some(handle) = self.frame_uniforms {
            let (width, height) = ec.window_size();
            let data = pack_floats(&[
                frame.time.as_secs_f32(),
                frame.delta.as_secs_f32(),
                width as f32,
                height as f32,
            ]);

            ec.submit(move |backend| {
                if let Err(error) = backend.upload_buffer_data(handle, 0, &data) {
                    error!("Couldn't upload frame uniforms: {error}");
                }
            });
        }
    }

    fn shutdown(&mut self, ec: &mut EngineContext) {
        if let Some(handle) = self.frame_uniforms.take() {
            ec.submit(move |backend| backend.destroy_buffer(handle));
        }

        let history = ec.frame_history();
        let history = history.read();
        let rendered = history.iter().filter(|timing| timing.rendered);
        let (count, total) = rendered.fold((0u32, Duration::ZERO), |(count, total), timing| {
            (count + 1, total + timing.total)
        });
        if count > 0 {
            info!(
                "Average main thread frame time: {:?} over the last {count} frames",
                total / count
            );
        }

        debug!("Render stats at shutdown: {:?}", ec.stats().snapshot());
    }
}
