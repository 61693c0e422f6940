use std::{
    sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

/// Lightweight render pipeline counters.
///
/// Every field is written by exactly one party (the render worker or the frame loop) and can be
/// read from anywhere. There's no consistency between fields, the last writer wins.
#[derive(Debug, Default)]
pub struct RenderStats {
    wait_time_ns: AtomicU64,
    work_time_ns: AtomicU64,
    executed_commands: AtomicUsize,
    render_passes: AtomicU64,
    frames_per_second: AtomicU32,
    frames_presented: AtomicU64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time the main thread spent in the last `wait_until_render_complete` call.
    pub fn wait_time(&self) -> Duration {
        Duration::from_nanos(self.wait_time_ns.load(Ordering::Relaxed))
    }

    /// Time the last render pass spent executing commands.
    pub fn work_time(&self) -> Duration {
        Duration::from_nanos(self.work_time_ns.load(Ordering::Relaxed))
    }

    /// Amount of commands executed by the last render pass.
    pub fn executed_commands(&self) -> usize {
        self.executed_commands.load(Ordering::Relaxed)
    }

    /// Total amount of render passes executed since the render thread started.
    pub fn render_passes(&self) -> u64 {
        self.render_passes.load(Ordering::Relaxed)
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second.load(Ordering::Relaxed)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented.load(Ordering::Relaxed)
    }

    pub(crate) fn record_wait(&self, time: Duration) {
        self.wait_time_ns.store(as_nanos(time), Ordering::Relaxed);
    }

    pub(crate) fn record_pass(&self, time: Duration, commands: usize) {
        self.work_time_ns.store(as_nanos(time), Ordering::Relaxed);
        self.executed_commands.store(commands, Ordering::Relaxed);
        self.render_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_rate(&self, fps: u32) {
        self.frames_per_second.store(fps, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies all counters into a plain struct, e.g. for display or logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            wait_time: self.wait_time(),
            work_time: self.work_time(),
            executed_commands: self.executed_commands(),
            render_passes: self.render_passes(),
            frames_per_second: self.frames_per_second(),
            frames_presented: self.frames_presented(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub wait_time: Duration,
    pub work_time: Duration,
    pub executed_commands: usize,
    pub render_passes: u64,
    pub frames_per_second: u32,
    pub frames_presented: u64,
}

fn as_nanos(time: Duration) -> u64 {
    u64::try_from(time.as_nanos()).unwrap_or(u64::MAX)
}
