//! Dodo Engine sandbox
//!
//! Opens a window and runs a small demo application through the engine frame loop. Mostly useful
//! for checking the render thread pipeline on real hardware, or with `--headless`, without any.

use anyhow::bail;
use clap::Parser;
use dodo::{
    config::{EngineConfig, RendererKind},
    engine::Engine,
    graphics::{share_backend, NullBackend, SharedBackend, WgpuBackend},
    platform::{HeadlessWindow, WinitWindow, Window},
    VERSION,
};
use dodo_utils::{AnyResult, AnyhowResultExt};
use log::*;
use std::{
    process,
    sync::atomic::{AtomicBool, Ordering},
};

pub mod app;
pub mod cli;

/// Frames rendered by a headless run without an explicit frame limit.
const DEFAULT_HEADLESS_FRAMES: u64 = 600;

/// Set while an engine is running. There's only ever one window and one render thread.
static ENGINE_RUNNING: AtomicBool = AtomicBool::new(false);

pub fn main() {
    let args = cli::Args::parse_from(wild::args());

    pretty_env_logger::formatted_builder()
        .format_indent(None)
        .format_timestamp(None)
        .filter_level(args.log_level)
        .filter_module("wgpu_hal", LevelFilter::Off)
        .filter_module("wgpu_core", LevelFilter::Error)
        .filter_module("naga", LevelFilter::Off)
        .init();

    info!("Welcome to Dodo Engine {VERSION}");

    #[cfg(feature = "crash-handler")]
    dodo::crash::enable_panic_handler();

    if let Err(error) = run(&args) {
        error!("{error:?}");
        process::exit(1);
    }
}

fn run(args: &cli::Args) -> AnyResult {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(policy) = args.threading_override() {
        config.engine.threading = policy;
    }
    if args.frames.is_some() {
        config.engine.frame_limit = args.frames;
    }
    if args.headless {
        config.window.headless = true;
    }
    if config.window.headless && config.engine.frame_limit.is_none() {
        info!("Headless run without a frame limit, stopping after {DEFAULT_HEADLESS_FRAMES} frames");
        config.engine.frame_limit = Some(DEFAULT_HEADLESS_FRAMES);
    }

    if ENGINE_RUNNING.swap(true, Ordering::AcqRel) {
        bail!("an engine is already running in this process");
    }

    let result = create_platform(&config).and_then(|(window, backend)| {
        let mut app = app::SandboxApp::new(config.renderer.clear_color);
        Engine::new(config, window, backend).run(&mut app)
    });

    ENGINE_RUNNING.store(false, Ordering::Release);
    result
}

fn create_platform(config: &EngineConfig) -> AnyResult<(Box<dyn Window>, SharedBackend)> {
    let section = &config.window;

    if section.headless {
        let window = HeadlessWindow::new(section.width, section.height);
        let backend = NullBackend::new();
        return Ok((Box::new(window), share_backend(backend)));
    }

    let window = WinitWindow::new(&section.title, section.width, section.height)?;
    let backend = match config.renderer.backend {
        RendererKind::Null => share_backend(NullBackend::new()),
        RendererKind::Vulkan | RendererKind::Auto => {
            let backend =
                WgpuBackend::new(&window.native_handle(), &config.renderer.wgpu_descriptor())
                    .otherwise("couldn't start the renderer")?;
            info!("Renderer: {}", backend.adapter_info().name);
            share_backend(backend)
        }
    };

    Ok((Box::new(window), backend))
}
