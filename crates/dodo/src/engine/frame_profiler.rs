use parking_lot::RwLock;
use smallvec::SmallVec;
use std::{
    collections::VecDeque,
    fmt::Debug,
    mem,
    sync::Arc,
    time::{Duration, Instant},
};

pub type FrameHistory = Arc<RwLock<VecDeque<FrameTiming>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// Waiting for the render thread to finish the previous frame.
    Wait,
    /// Polling and dispatching window events.
    Events,
    /// Application frame logic, scheduling render commands.
    Update,
    /// Flipping the render queues.
    Submit,
    /// Sleeping through a frame that renders nothing.
    Idle,
}

/// Main thread timings of a single frame loop iteration.
#[derive(Clone)]
pub struct FrameTiming {
    pub index: u64,
    pub start: Instant,
    pub total: Duration,
    /// Whether this iteration scheduled any render work.
    pub rendered: bool,
    pub stages: SmallVec<[(FrameStage, Duration); 5]>,
}

impl FrameTiming {
    /// Total time spent in a stage during this frame.
    pub fn stage_time(&self, stage: FrameStage) -> Duration {
        self.stages
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|&(_, time)| time)
            .sum()
    }
}

impl Debug for FrameTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTiming")
            .field("index", &self.index)
            .field("total", &self.total)
            .field("rendered", &self.rendered)
            .field("stages", &self.stages)
            .finish()
    }
}

/// Records how the main thread spends each frame. Finished frames land in a bounded
/// [`FrameHistory`], shared with the application through the engine context.
pub struct FrameProfiler {
    pub max_history_size: usize,
    history: FrameHistory,
    frame_index: u64,
    frame_start: Instant,
    stage: FrameStage,
    stage_start: Instant,
    stages: SmallVec<[(FrameStage, Duration); 5]>,
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self {
            // ~80 seconds @ 60 FPS
            max_history_size: 5000,
            history: FrameHistory::default(),
            frame_index: 0,
            frame_start: Instant::now(),
            stage: FrameStage::Wait,
            stage_start: Instant::now(),
            stages: SmallVec::new(),
        }
    }

    pub fn history(&self) -> FrameHistory {
        self.history.clone()
    }

    pub fn begin_frame(&mut self, index: u64) {
        debug_assert!(self.stages.is_empty());
        let now = Instant::now();
        self.frame_index = index;
        self.frame_start = now;
        self.stage = FrameStage::Wait;
        self.stage_start = now;
    }

    pub fn next_stage(&mut self, stage: FrameStage) {
        let now = Instant::now();
        self.stages
            .push((self.stage, now.duration_since(self.stage_start)));
        self.stage = stage;
        self.stage_start = now;
    }

    pub fn finish_frame(&mut self, rendered: bool) {
        let now = Instant::now();
        self.stages
            .push((self.stage, now.duration_since(self.stage_start)));

        let timing = FrameTiming {
            index: self.frame_index,
            start: self.frame_start,
            total: now.duration_since(self.frame_start),
            rendered,
            stages: mem::take(&mut self.stages),
        };

        let mut history = self.history.write();
        if history.len() >= self.max_history_size {
            history.pop_front();
        }
        history.push_back(timing);
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts frames over wall clock seconds.
pub struct FrameRateCounter {
    window_start: Instant,
    frames: u32,
}

impl FrameRateCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Counts a frame. Once per second, returns the amount of frames in the last second.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        self.report(now)
    }

    /// Lets time pass without a frame, so that the rate drops to zero while nothing renders.
    pub fn idle(&mut self, now: Instant) -> Option<u32> {
        self.report(now)
    }

    fn report(&mut self, now: Instant) -> Option<u32> {
        let elapsed = now.duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}
