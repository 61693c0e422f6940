use super::{EventCallback, NativeHandle, Window, WindowEvent};
use std::collections::VecDeque;

/// A window that doesn't exist.
///
/// Events are scripted: they're queued up front and delivered one batch per
/// [`Window::process_events`] call. Optionally the window "closes" itself after a set amount of
/// polls, which is what `--headless` runs and the frame loop tests rely on.
pub struct HeadlessWindow {
    width: u32,
    height: u32,
    focused: bool,
    polls: u64,
    close_after: Option<u64>,
    scripted: VecDeque<(u64, WindowEvent)>,
    callback: Option<EventCallback>,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            focused: true,
            polls: 0,
            close_after: None,
            scripted: VecDeque::new(),
            callback: None,
        }
    }

    /// Emits [`WindowEvent::Closed`] during the `polls`-th call to [`Window::process_events`].
    pub fn close_after(mut self, polls: u64) -> Self {
        self.close_after = Some(polls);
        self
    }

    /// Schedules an event for the `poll`-th call to [`Window::process_events`] (1-based).
    pub fn schedule_event(mut self, poll: u64, event: WindowEvent) -> Self {
        self.scripted.push_back((poll, event));
        self.scripted
            .make_contiguous()
            .sort_by_key(|&(poll, _)| poll);
        self
    }

    fn emit(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::FocusChanged(focused) => self.focused = focused,
            WindowEvent::Resized { width, height } => {
                self.width = width;
                self.height = height;
            }
            _ => {}
        }

        if let Some(callback) = self.callback.as_mut() {
            callback(&event);
        }
    }
}

impl Window for HeadlessWindow {
    fn process_events(&mut self) {
        self.polls += 1;

        while let Some(&(poll, event)) = self.scripted.front() {
            if poll > self.polls {
                break;
            }
            self.scripted.pop_front();
            self.emit(event);
        }

        if self.close_after == Some(self.polls) {
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
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn native_handle(&self) -> NativeHandle {
        NativeHandle::Headless
    }

    fn set_visible(&mut self, _visible: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn scripted_events_arrive_in_order() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut window = HeadlessWindow::new(800, 600)
            .schedule_event(2, WindowEvent::FocusChanged(false))
            .schedule_event(1, WindowEvent::Resized { width: 1024, height: 768 })
            .close_after(3);

        let sink = received.clone();
        window.set_event_callback(Box::new(move |event| sink.borrow_mut().push(*event)));

        window.process_events();
        assert_eq!((window.width(), window.height()), (1024, 768));
        assert!(window.has_focus());

        window.process_events();
        assert!(!window.has_focus());

        window.process_events();
        window.process_events();

        assert_eq!(
            *received.borrow(),
            vec![
                WindowEvent::Resized { width: 1024, height: 768 },
                WindowEvent::FocusChanged(false),
                WindowEvent::Closed,
            ]
        );
        assert!(matches!(window.native_handle(), NativeHandle::Headless));
    }
}
