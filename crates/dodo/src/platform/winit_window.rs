use super::{EventCallback, NativeHandle, Window, WindowEvent};
use anyhow::anyhow;
use dodo_utils::AnyResult;
use log::*;
use smallvec::SmallVec;
use std::{sync::Arc, time::Duration};
use winit::{
    dpi::LogicalSize,
    event::{Event, WindowEvent as WinitEvent},
    event_loop::EventLoop,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::WindowBuilder,
};

/// Desktop window, backed by winit.
///
/// Instead of handing the main thread over to winit's event loop, the loop is pumped once per
/// frame from [`Window::process_events`], so the engine keeps control over its frame loop.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    window: Arc<winit::window::Window>,
    focused: bool,
    minimized: bool,
    callback: Option<EventCallback>,
}

impl WinitWindow {
    /// Creates and shows the window. Must be called on the main thread.
    pub fn new(title: &str, width: u32, height: u32) -> AnyResult<Self> {
        let event_loop =
            EventLoop::new().map_err(|e| anyhow!("couldn't create the event loop: {e}"))?;
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .build(&event_loop)
            .map_err(|e| anyhow!("couldn't create main window: {e}"))?;

        info!(
            "Created window `{title}` ({}x{})",
            window.inner_size().width,
            window.inner_size().height
        );

        Ok(Self {
            event_loop,
            window: Arc::new(window),
            focused: true,
            minimized: false,
            callback: None,
        })
    }

    fn translate(&mut self, event: WinitEvent) -> Option<WindowEvent> {
        match event {
            WinitEvent::CloseRequested => Some(WindowEvent::Closed),

            WinitEvent::Resized(size) if size.width == 0 || size.height == 0 => {
                self.minimized = true;
                Some(WindowEvent::Minimized)
            }

            WinitEvent::Resized(size) => {
                if self.minimized {
                    self.minimized = false;
                    self.emit(WindowEvent::Restored);
                }
                Some(WindowEvent::Resized {
                    width: size.width,
                    height: size.height,
                })
            }

            WinitEvent::Focused(focused) => {
                self.focused = focused;
                Some(WindowEvent::FocusChanged(focused))
            }

            _ => None,
        }
    }

    fn emit(&mut self, event: WindowEvent) {
        if let Some(callback) = self.callback.as_mut() {
            callback(&event);
        }
    }
}

impl Window for WinitWindow {
    fn process_events(&mut self) {
        let window_id = self.window.id();
        let mut collected: SmallVec<[WinitEvent; 8]> = SmallVec::new();

        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _target| {
                if let Event::WindowEvent { window_id: id, event } = event {
                    if id == window_id {
                        collected.push(event);
                    }
                }
            });

        for event in collected {
            if let Some(event) = self.translate(event) {
                self.emit(event);
            }
        }

        if let PumpStatus::Exit(code) = status {
            debug!("Event loop exited with code {code}");
            self.emit(WindowEvent::Closed);
        }
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn set_event_callback(&mut self, callback: EventCallback) {
        self.callback = Some(callback);
    }

    fn width(&self) -> u32 {
        self.window.inner_size().width
    }

    fn height(&self) -> u32 {
        self.window.inner_size().height
    }

    fn native_handle(&self) -> NativeHandle {
        NativeHandle::Winit(self.window.clone())
    }

    fn set_visible(&mut self, visible: bool) {
        self.window.set_visible(visible);
    }
}
