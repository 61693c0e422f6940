//! The frame loop
//!
//! The engine runs a single [`Application`] on the main thread. Every iteration of the frame loop:
//!  1. waits for the render thread to finish the previous frame
//!  2. polls window events and dispatches them to the engine and the application
//!  3. if the window is focused and not minimized, begins a frame, lets the application schedule
//!     its render commands, schedules the present, and flips the render queues
//!  4. otherwise sleeps for a short while, so that a background window doesn't burn the CPU
//!
//! Applications never touch the [`RenderBackend`] directly. Everything goes through render
//! commands submitted via [`EngineContext::submit`], which are executed on the render thread one
//! frame later.
//!
//! ## Notes for implementing applications
//!  * Don't assume that commands run on another thread. The single-threaded policy executes them
//!    on the main thread, during [`crate::render_thread::RenderThread::next_frame`].
//!  * Don't block inside commands waiting for the main thread. The main thread may itself be
//!    waiting for the render thread.

use crate::{
    config::EngineConfig,
    graphics::{RenderBackend, SharedBackend},
    platform::{Window, WindowEvent},
    render_thread::{RenderStats, RenderThread},
};
use dodo_utils::AnyResult;
use log::*;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

mod runner;

#[doc(inline)]
pub use frame_profiler::*;
mod frame_profiler;

/// Engine state available to the [`Application`].
pub struct EngineContext {
    render_thread: RenderThread,
    backend: SharedBackend,
    /// See: [`Self::request_shutdown`]
    should_run: bool,
    frame_history: FrameHistory,
    window_size: (u32, u32),
}

impl EngineContext {
    fn new(backend: SharedBackend, frame_history: FrameHistory, window_size: (u32, u32)) -> Self {
        Self {
            render_thread: RenderThread::new(),
            backend,
            should_run: true,
            frame_history,
            window_size,
        }
    }

    /// Schedules a render command for the current frame.
    ///
    /// The closure receives the backend once the render thread gets to it, which is after the
    /// current frame is flipped. It must not block on the main thread.
    pub fn submit(&self, f: impl FnOnce(&mut dyn RenderBackend) + Send + 'static) {
        let backend = self.backend.clone();
        self.render_thread.submit(move || f(&mut *backend.lock()));
    }

    /// Runs a closure on the render thread and waits for its result.
    ///
    /// This flushes every pending command, including the ones scheduled for the current frame.
    /// It's meant for startup work like resource creation, not for per-frame use.
    pub fn execute_sync<R>(&self, f: impl FnOnce(&mut dyn RenderBackend) -> R + Send + 'static) -> R
    where
        R: Send + 'static,
    {
        let (sender, receiver) = crossbeam::channel::bounded(1);
        self.submit(move |backend| {
            // The receiver lives until this function returns
            let _ = sender.send(f(backend));
        });
        self.render_thread.pump();

        receiver
            .recv()
            .expect("render command finished without producing a result")
    }

    /// Tells the engine to break out of its loop at the end of the current frame.
    pub fn request_shutdown(&mut self) {
        trace!("Shutdown requested");
        self.should_run = false;
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        self.render_thread.stats()
    }

    pub fn frame_history(&self) -> FrameHistory {
        self.frame_history.clone()
    }

    /// Last known size of the window, in physical pixels.
    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }
}

/// Timing of the frame being built.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Index of the rendered frame, starting at 0. Frames skipped because of an unfocused or
    /// minimized window don't count.
    pub index: u64,
    /// Time since the previous rendered frame.
    pub delta: Duration,
    /// Time since the frame loop started.
    pub time: Duration,
}

/// The game (or any other program) driven by the [`Engine`].
pub trait Application {
    /// The application's name, used in logs. It must be a constant.
    fn label(&self) -> &'static str;

    /// Called once, after the render thread is started and before the first frame. Render
    /// resources are usually created here, with [`EngineContext::execute_sync`].
    ///
    /// Returning an error aborts the startup.
    fn init(&mut self, ec: &mut EngineContext) -> AnyResult {
        let _ = ec;
        Ok(())
    }

    /// Called for every window event, after the engine has processed it.
    fn on_event(&mut self, ec: &mut EngineContext, event: &WindowEvent) {
        let _ = (ec, event);
    }

    /// Called once per rendered frame, between the engine's frame begin and present commands.
    fn frame(&mut self, ec: &mut EngineContext, frame: &FrameInfo) {
        let _ = (ec, frame);
    }

    /// Called once after the frame loop ends, while the render thread is still running.
    fn shutdown(&mut self, ec: &mut EngineContext) {
        let _ = ec;
    }
}

/// The frame loop driver. Owns the window, the render thread and the backend.
pub struct Engine {
    config: EngineConfig,
    window: Box<dyn Window>,
    context: EngineContext,
    profiler: FrameProfiler,
    /// Window events collected by the window callback, dispatched once per frame.
    window_events: Arc<Mutex<Vec<WindowEvent>>>,
    minimized: bool,
}

impl Engine {
    pub fn new(config: EngineConfig, mut window: Box<dyn Window>, backend: SharedBackend) -> Self {
        let window_events: Arc<Mutex<Vec<WindowEvent>>> = Arc::default();
        let sink = window_events.clone();
        window.set_event_callback(Box::new(move |event| sink.lock().push(*event)));

        let profiler = FrameProfiler::new();
        let window_size = (window.width(), window.height());

        Self {
            config,
            window,
            context: EngineContext::new(backend, profiler.history(), window_size),
            profiler,
            window_events,
            minimized: false,
        }
    }
}
