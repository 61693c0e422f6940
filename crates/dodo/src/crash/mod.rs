//! Crash handling
//!
//! Nothing in the engine tries to recover from a panic. A failed render command takes the render
//! thread down, and with it, the whole engine. The panic hook installed here makes sure that
//! such a crash leaves a readable report behind, and that the process actually terminates,
//! instead of leaving a half-alive engine waiting for a dead thread.

use log::*;
use std::{fmt::Display, panic, process, thread};

/// Installs the crash report panic hook. Should be called once, early in `main`.
pub fn enable_panic_handler() {
    panic::set_hook(Box::new(|info| {
        let report = generate_error_log(info, thread::current().name());
        error!("{report}");
        eprintln!("{report}");
        process::abort();
    }));
}

pub fn generate_error_log(message: &dyn Display, thread_name: Option<&str>) -> String {
    format!(
        "Dodo Engine {} Crash Report\n\n\
        \
        Local time: {}\n\
        Build type: {}\n\
        Thread: {}\n\n\
        \
        {}",
        crate::VERSION,
        chrono::Local::now(),
        if cfg!(debug_assertions) { "Debug" } else { "Release" },
        thread_name.unwrap_or("(unnamed)"),
        message,
    )
}

#[cfg(test)]
mod tests {
    use super::generate_error_log;

    #[test]
    fn report_mentions_thread_and_message() {
        let report = generate_error_log(&"render command failed", Some("Render Thread"));
        assert!(report.starts_with("Dodo Engine "));
        assert!(report.contains("Thread: Render Thread"));
        assert!(report.ends_with("render command failed"));
    }
}
