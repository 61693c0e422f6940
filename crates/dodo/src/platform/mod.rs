//! Platform window collaborators
//!
//! The frame loop only needs a handful of things from a window: a way to poll OS events, the
//! focus state, the size, and an opaque native handle that renderer backends know how to use.

use std::sync::Arc;

#[doc(inline)]
pub use headless::*;
mod headless;

#[doc(inline)]
pub use winit_window::*;
mod winit_window;

/// Events a window reports through its [`EventCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked for the window to close.
    Closed,
    Resized { width: u32, height: u32 },
    Minimized,
    Restored,
    FocusChanged(bool),
}

pub type EventCallback = Box<dyn FnMut(&WindowEvent)>;

/// Native window handle, passed to renderer backends as-is.
#[derive(Clone)]
pub enum NativeHandle {
    /// No native window exists.
    Headless,
    Winit(Arc<winit::window::Window>),
}

pub trait Window {
    /// Polls pending OS events without blocking. Every event is passed to the registered
    /// callback before this function returns.
    fn process_events(&mut self);

    fn has_focus(&self) -> bool;

    /// Registers the callback receiving window events, replacing the previous one.
    fn set_event_callback(&mut self, callback: EventCallback);

    /// Width of the drawable area, in physical pixels.
    fn width(&self) -> u32;

    /// Height of the drawable area, in physical pixels.
    fn height(&self) -> u32;

    fn native_handle(&self) -> NativeHandle;

    fn set_visible(&mut self, visible: bool);
}
