use clap::Parser;
use dodo::render_thread::ThreadingPolicy;
use log::LevelFilter;
use std::path::PathBuf;

/// User-specified command line parameters
#[derive(Debug, Parser)]
#[clap(name = "Dodo Sandbox", about)]
pub struct Args {
    #[clap(long, short = 'c')]
    /// Path to the engine configuration file. Defaults are used if not specified.
    pub config: Option<PathBuf>,

    #[clap(long)]
    /// Executes render commands on the main thread, instead of a dedicated render thread.
    pub single_thread: bool,

    #[clap(long)]
    /// Runs without a window, using the null renderer.
    pub headless: bool,

    #[clap(long)]
    /// Exits after rendering this many frames.
    pub frames: Option<u64>,

    #[clap(long, default_value_t = LevelFilter::Debug)]
    /// Maximum log level (off, error, warn, info, debug, trace).
    pub log_level: LevelFilter,
}

impl Args {
    pub fn threading_override(&self) -> Option<ThreadingPolicy> {
        self.single_thread.then_some(ThreadingPolicy::SingleThreaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = Args::parse_from([
            "dodo_sandbox",
            "--single-thread",
            "--headless",
            "--frames",
            "10",
            "--log-level",
            "warn",
        ]);

        assert!(args.headless);
        assert_eq!(args.frames, Some(10));
        assert_eq!(args.log_level, LevelFilter::Warn);
        assert_eq!(
            args.threading_override(),
            Some(ThreadingPolicy::SingleThreaded)
        );
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["dodo_sandbox"]);
        assert!(args.config.is_none());
        assert!(!args.headless);
        assert_eq!(args.threading_override(), None);
    }
}
