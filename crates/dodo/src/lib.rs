//! Dodo Engine core
//!
//! The centerpiece is the [`render_thread`] pipeline: game code records deferred render commands
//! into one queue, while a dedicated render thread drains the other queue from the previous frame.
//! Around it sit the [`engine`] frame loop, the [`platform`] windows and the [`graphics`] backends.

pub mod config;
pub mod crash;
pub mod engine;
pub mod graphics;
pub mod platform;
pub mod render_thread;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
