use super::{Application, Engine, FrameInfo, FrameRateCounter, FrameStage};
use crate::platform::WindowEvent;
use dodo_utils::{ok, AnyResult};
use log::*;
use std::{mem, thread, time::Instant};

impl Engine {
    /// Runs the frame loop until the window is closed, the application requests a shutdown or
    /// the configured frame limit is reached.
    ///
    /// The render thread is started before [`Application::init`] and stopped after
    /// [`Application::shutdown`], with every pending command executed.
    pub fn run(mut self, app: &mut dyn Application) -> AnyResult {
        let policy = self.config.engine.threading;
        info!(
            "Running `{}` ({policy:?}, {} backend)",
            app.label(),
            self.context.backend.lock().name()
        );

        self.context.render_thread.start(policy);

        // On failure the render thread is stopped when the engine is dropped
        app.init(&mut self.context)?;

        // Resources created during init shouldn't count towards the first frame
        self.context.render_thread.pump();

        let stats = self.context.stats();
        let start = Instant::now();
        let mut last_frame = start;
        let mut frame_rate = FrameRateCounter::new(start);
        let mut iteration = 0;
        let mut rendered_frames = 0;

        trace!("Starting the frame loop");
        loop {
            self.profiler.begin_frame(iteration);
            self.context.render_thread.wait_until_render_complete();

            self.profiler.next_stage(FrameStage::Events);
            self.window.process_events();
            let events = mem::take(&mut *self.window_events.lock());
            for event in &events {
                self.handle_event(event);
                app.on_event(&mut self.context, event);
            }

            if !self.context.should_run {
                self.profiler.finish_frame(false);
                break;
            }

            let rendering = self.window.has_focus() && !self.minimized;
            if rendering {
                self.profiler.next_stage(FrameStage::Update);
                let now = Instant::now();
                let frame = FrameInfo {
                    index: rendered_frames,
                    delta: now.duration_since(last_frame),
                    time: now.duration_since(start),
                };
                last_frame = now;

                let clear_color = self.config.renderer.clear_color;
                self.context.submit(move |backend| {
                    if let Err(error) = backend.begin_frame() {
                        panic!("couldn't begin a frame: {error}");
                    }
                    backend.clear(clear_color);
                });

                app.frame(&mut self.context, &frame);

                let frame_stats = stats.clone();
                self.context.submit(move |backend| match backend.present() {
                    Ok(status) if status.is_ready() => frame_stats.record_frame(),
                    Ok(_) => {}
                    Err(error) => panic!("couldn't present a frame: {error}"),
                });

                self.profiler.next_stage(FrameStage::Submit);
                self.context.render_thread.next_frame();
                rendered_frames += 1;

                if let Some(fps) = frame_rate.tick(Instant::now()) {
                    stats.record_frame_rate(fps);
                    debug!(
                        "{fps} FPS, {} presented frames, {} commands executed",
                        stats.frames_presented(),
                        stats.executed_commands()
                    );
                }
            } else {
                self.profiler.next_stage(FrameStage::Idle);
                thread::sleep(self.config.engine.idle_sleep());

                if let Some(fps) = frame_rate.idle(Instant::now()) {
                    stats.record_frame_rate(fps);
                }
            }

            self.profiler.finish_frame(rendering);
            iteration += 1;

            if let Some(limit) = self.config.engine.frame_limit {
                if rendered_frames >= limit {
                    info!("Reached the limit of {limit} frames");
                    break;
                }
            }
        }

        info!("Shutting down `{}`", app.label());

        // Hide the window here, so that it disappears faster
        self.window.set_visible(false);

        app.shutdown(&mut self.context);
        self.context.render_thread.stop();

        let snapshot = stats.snapshot();
        debug!("Final render stats: {snapshot:?}");

        ok()
    }

    fn handle_event(&mut self, event: &WindowEvent) {
        match *event {
            WindowEvent::Closed => {
                info!("Window closed");
                self.context.request_shutdown();
            }

            WindowEvent::Resized { width, height } => {
                trace!("Window resized to {width}x{height}");
                self.context.window_size = (width, height);

                if width == 0 || height == 0 {
                    self.minimized = true;
                } else {
                    self.minimized = false;
                    self.context
                        .submit(move |backend| backend.on_resize(width, height));
                }
            }

            WindowEvent::Minimized => {
                trace!("Window minimized");
                self.minimized = true;
            }

            WindowEvent::Restored => {
                trace!("Window restored");
                self.minimized = false;
            }

            WindowEvent::FocusChanged(focused) => {
                trace!("Window focus changed: {focused}");
            }
        }
    }
}
