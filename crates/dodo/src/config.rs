//! Engine configuration, read from a TOML file
//!
//! Every field has a default, so an empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! [engine]
//! threading = "multi-threaded"
//! frame_limit = 600
//!
//! [window]
//! title = "Dodo Engine"
//! width = 1280
//! height = 720
//!
//! [renderer]
//! backend = "vulkan"
//! clear_color = [0.02, 0.02, 0.05, 1.0]
//! ```

use crate::{
    graphics::{CapabilityRequest, Color, WgpuBackendDescriptor},
    render_thread::ThreadingPolicy,
};
use dodo_utils::{AnyResult, AnyhowResultExt};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub window: WindowSection,
    pub renderer: RendererSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub threading: ThreadingPolicy,
    /// Stops the engine after this many rendered frames.
    pub frame_limit: Option<u64>,
    /// How long to sleep in frames that render nothing (unfocused or minimized window).
    pub idle_sleep_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            threading: ThreadingPolicy::MultiThreaded,
            frame_limit: None,
            idle_sleep_ms: 10,
        }
    }
}

impl EngineSection {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Runs without a native window, implies the null renderer.
    pub headless: bool,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: String::from("Dodo Engine"),
            width: 1280,
            height: 720,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RendererKind {
    /// wgpu restricted to Vulkan.
    Vulkan,
    /// wgpu with whatever graphics API is available.
    Auto,
    /// Renders nothing.
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    High,
    Low,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererSection {
    pub backend: RendererKind,
    pub power_preference: PowerPreference,
    pub clear_color: Color,
    /// Requests BC texture compression support. Startup fails without it if set to `true`.
    pub require_bc_compression: bool,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            backend: RendererKind::Vulkan,
            power_preference: PowerPreference::High,
            clear_color: Color::new(0.02, 0.02, 0.05, 1.0),
            require_bc_compression: false,
        }
    }
}

impl RendererSection {
    /// Builds the wgpu startup settings out of this section.
    pub fn wgpu_descriptor(&self) -> WgpuBackendDescriptor {
        let bc = wgpu::Features::TEXTURE_COMPRESSION_BC;

        WgpuBackendDescriptor {
            backends: match self.backend {
                RendererKind::Auto => wgpu::Backends::all(),
                RendererKind::Vulkan | RendererKind::Null => wgpu::Backends::VULKAN,
            },
            power_preference: match self.power_preference {
                PowerPreference::High => wgpu::PowerPreference::HighPerformance,
                PowerPreference::Low => wgpu::PowerPreference::LowPower,
            },
            capabilities: vec![
                CapabilityRequest::optional(wgpu::Features::CLEAR_TEXTURE),
                match self.require_bc_compression {
                    true => CapabilityRequest::required(bc),
                    false => CapabilityRequest::optional(bc),
                },
            ],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> AnyResult<Self> {
        toml::from_str(s).otherwise("invalid engine configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .otherwise_with(|| format!("couldn't read config file `{}`", path.display()))?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.threading, ThreadingPolicy::MultiThreaded);
        assert_eq!(config.engine.frame_limit, None);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.renderer.backend, RendererKind::Vulkan);
    }

    #[test]
    fn full_config_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            [engine]
            threading = "single-threaded"
            frame_limit = 30
            idle_sleep_ms = 5

            [window]
            title = "Test"
            width = 320
            height = 200
            headless = true

            [renderer]
            backend = "null"
            power_preference = "low"
            clear_color = [1.0, 0.5, 0.25, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.threading, ThreadingPolicy::SingleThreaded);
        assert_eq!(config.engine.frame_limit, Some(30));
        assert_eq!(config.engine.idle_sleep(), Duration::from_millis(5));
        assert_eq!(config.window.title, "Test");
        assert!(config.window.headless);
        assert_eq!(config.renderer.backend, RendererKind::Null);
        assert_eq!(config.renderer.clear_color, Color::new(1.0, 0.5, 0.25, 1.0));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(EngineConfig::from_toml_str("[engine]\nthreads = 4").is_err());
        assert!(EngineConfig::from_toml_str("[engine]\nthreading = \"many\"").is_err());
    }

    #[test]
    fn bc_compression_requirement() {
        let mut renderer = RendererSection::default();
        let desc = renderer.wgpu_descriptor();
        assert_eq!(desc.backends, wgpu::Backends::VULKAN);
        assert!(desc.capabilities.iter().all(|c| !c.required));

        renderer.require_bc_compression = true;
        renderer.backend = RendererKind::Auto;
        let desc = renderer.wgpu_descriptor();
        assert_eq!(desc.backends, wgpu::Backends::all());
        assert!(desc
            .capabilities
            .contains(&CapabilityRequest::required(wgpu::Features::TEXTURE_COMPRESSION_BC)));
    }
}
