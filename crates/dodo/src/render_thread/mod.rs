//! The render thread command pipeline
//!
//! Game code never talks to the graphics API directly. Instead, it submits [`Command`]s, which are
//! deferred closures executed later on the render thread. The [`RenderThread`] controller owns two
//! [`CommandQueue`]s. One of them accepts submissions, while the other one is being drained by the
//! render worker. Every [`RenderThread::next_frame`] call swaps these roles.
//!
//! A frame, from the point of view of the main thread, looks like this:
//!  1. [`RenderThread::wait_until_render_complete`], which bounds the main thread to at most one
//!     frame ahead of the renderer
//!  2. any amount of [`RenderThread::submit`] calls
//!  3. [`RenderThread::next_frame`], which flips the queues and kicks off the render worker
//!
//! ## Threading policies
//! With [`ThreadingPolicy::MultiThreaded`], a dedicated worker thread sleeps until it's kicked,
//! drains the render queue and goes back to idle. All state transitions go through one mutex and
//! one condition variable.
//!
//! With [`ThreadingPolicy::SingleThreaded`] (or [`ThreadingPolicy::None`]) there's no worker at
//! all. [`RenderThread::next_frame`] executes the render queue inline and every wait is a no-op.
//! The observable order of executed commands is identical in both modes.
//!
//! ## Failures
//! Commands are not isolated. A panic inside a command on the worker thread aborts the whole
//! process, as the main thread would otherwise wait for the worker forever.

use log::*;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Deserialize;
use std::{
    mem, process,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

#[doc(inline)]
pub use command_queue::*;
mod command_queue;

#[doc(inline)]
pub use stats::*;
mod stats;

/// Preallocated capacity of both command queues.
const INITIAL_QUEUE_CAPACITY: usize = 256;

/// Decides where render commands are executed. Fixed for the lifetime of a [`RenderThread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadingPolicy {
    /// No policy was chosen, behaves like [`ThreadingPolicy::SingleThreaded`].
    None,
    /// Commands execute synchronously on the thread calling [`RenderThread::next_frame`].
    SingleThreaded,
    /// Commands execute on a dedicated render thread.
    #[default]
    MultiThreaded,
}

impl ThreadingPolicy {
    /// Whether a dedicated worker thread is used.
    pub fn is_threaded(self) -> bool {
        self == ThreadingPolicy::MultiThreaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderThreadState {
    /// The controller hasn't been started yet.
    Uninitialized,
    /// No render work is in flight. Queues can be flipped.
    Idle,
    /// The worker was asked to drain the render queue, but hasn't picked it up yet.
    Kick,
    /// The worker is executing commands.
    Busy,
}

/// Everything shared by the main thread and the worker, guarded by a single mutex.
struct Pipeline {
    state: RenderThreadState,
    /// Set between [`RenderThread::start`] and [`RenderThread::stop`]. Submissions are rejected
    /// outside of this window.
    running: bool,
    /// Tells the worker to leave its loop once there's nothing left to do.
    shutdown: bool,
    queues: [CommandQueue; 2],
    submission_index: usize,
}

impl Pipeline {
    fn render_index(&self) -> usize {
        (self.submission_index + 1) % 2
    }

    fn flip(&mut self) {
        self.submission_index = self.render_index();
    }
}

struct Shared {
    pipeline: Mutex<Pipeline>,
    state_changed: Condvar,
    stats: Arc<RenderStats>,
}

impl Shared {
    fn submit(&self, command: Command) {
        let mut pipeline = self.pipeline.lock();
        assert!(
            pipeline.running,
            "render command submitted while the render thread isn't running"
        );

        let index = pipeline.submission_index;
        pipeline.queues[index].submit_boxed(command);
    }

    fn set_state(&self, pipeline: &mut MutexGuard<Pipeline>, state: RenderThreadState) {
        trace!("Render thread state: {:?} -> {:?}", pipeline.state, state);
        pipeline.state = state;
        self.state_changed.notify_all();
    }

    fn wait_for_state(&self, pipeline: &mut MutexGuard<Pipeline>, state: RenderThreadState) {
        while pipeline.state != state {
            self.state_changed.wait(pipeline);
        }
    }

    /// Takes the render queue out of the pipeline and drains it with the lock released, so that
    /// submissions into the other queue can continue in the meantime.
    fn execute_render_queue(&self, pipeline: &mut MutexGuard<Pipeline>) {
        let index = pipeline.render_index();
        let mut queue = mem::take(&mut pipeline.queues[index]);

        let start = Instant::now();
        let executed = MutexGuard::unlocked(pipeline, || queue.execute());
        self.stats.record_pass(start.elapsed(), executed);

        pipeline.queues[index] = queue;
    }
}

/// The render thread controller. See the [module documentation](self) for details.
pub struct RenderThread {
    shared: Arc<Shared>,
    policy: ThreadingPolicy,
    worker: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline: Mutex::new(Pipeline {
                    state: RenderThreadState::Uninitialized,
                    running: false,
                    shutdown: false,
                    queues: [
                        CommandQueue::with_capacity(INITIAL_QUEUE_CAPACITY),
                        CommandQueue::with_capacity(INITIAL_QUEUE_CAPACITY),
                    ],
                    submission_index: 0,
                }),
                state_changed: Condvar::new(),
                stats: Arc::new(RenderStats::new()),
            }),
            policy: ThreadingPolicy::None,
            worker: None,
        }
    }

    /// Starts the controller with the given policy. Under [`ThreadingPolicy::MultiThreaded`] this
    /// spawns the render worker.
    ///
    /// ## Panics
    /// Panics if the controller has already been started before.
    pub fn start(&mut self, policy: ThreadingPolicy) {
        {
            let mut pipeline = self.shared.pipeline.lock();
            assert_eq!(
                pipeline.state,
                RenderThreadState::Uninitialized,
                "render thread started twice"
            );
            pipeline.running = true;
            self.shared.set_state(&mut pipeline, RenderThreadState::Idle);
        }

        self.policy = policy;
        if policy.is_threaded() {
            let shared = self.shared.clone();
            let worker = thread::Builder::new()
                .name(String::from("Render Thread"))
                .spawn(move || worker_loop(shared))
                .expect("couldn't spawn the render thread");
            self.worker = Some(worker);
        }

        debug!("Render thread controller started ({policy:?})");
    }

    /// Executes all pending work, then shuts the worker down and joins it.
    ///
    /// Commands submitted by commands executed during shutdown are drained as well.
    ///
    /// ## Panics
    /// Panics if the controller isn't running.
    pub fn stop(&mut self) {
        assert!(self.is_running(), "render thread stopped while not running");
        trace!("Stopping the render thread controller");

        loop {
            self.pump();

            let mut pipeline = self.shared.pipeline.lock();
            let index = pipeline.submission_index;
            if pipeline.queues[index].is_empty() {
                pipeline.running = false;
                pipeline.shutdown = true;
                self.shared.state_changed.notify_all();
                break;
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("The render thread has panicked");
            }
        }

        debug!("Render thread controller stopped");
    }

    /// Enqueues a command for the next frame. Never blocks for longer than a queue push.
    ///
    /// ## Panics
    /// Panics if the controller isn't running.
    pub fn submit(&self, command: impl FnOnce() + Send + 'static) {
        self.shared.submit(Box::new(command));
    }

    /// Swaps the submission and render queues and starts draining the render queue.
    ///
    /// Under the multi-threaded policy this first waits for the previous render pass to finish,
    /// as the render queue can't be swapped while it's being drained. Under the single-threaded
    /// policy the queue is drained before this function returns.
    pub fn next_frame(&self) {
        let mut pipeline = self.shared.pipeline.lock();
        assert_ne!(
            pipeline.state,
            RenderThreadState::Uninitialized,
            "render thread flushed before being started"
        );

        if self.policy.is_threaded() {
            self.shared
                .wait_for_state(&mut pipeline, RenderThreadState::Idle);
            pipeline.flip();
            self.shared.set_state(&mut pipeline, RenderThreadState::Kick);
        } else {
            pipeline.flip();
            self.shared.execute_render_queue(&mut pipeline);
        }
    }

    /// Alias of [`Self::next_frame`].
    #[inline]
    pub fn flush(&self) {
        self.next_frame();
    }

    /// Blocks until the render worker goes idle, i.e. until every command submitted before the
    /// last [`Self::next_frame`] has finished executing.
    pub fn wait_until_render_complete(&self) {
        if !self.policy.is_threaded() {
            self.shared.stats.record_wait(Duration::ZERO);
            return;
        }

        let start = Instant::now();
        let mut pipeline = self.shared.pipeline.lock();
        self.shared
            .wait_for_state(&mut pipeline, RenderThreadState::Idle);
        drop(pipeline);

        self.shared.stats.record_wait(start.elapsed());
    }

    /// Flushes and waits. Executes everything submitted so far, synchronously.
    pub fn pump(&self) {
        self.next_frame();
        self.wait_until_render_complete();
    }

    /// Shuts the controller down without executing anything that's still queued. Used when the
    /// owning thread unwinds, as a failed command is fatal.
    fn abandon(&mut self) {
        warn!("Render thread controller dropped while panicking, discarding pending commands");

        let discarded = {
            let mut pipeline = self.shared.pipeline.lock();
            pipeline.running = false;
            pipeline.shutdown = true;
            self.shared.state_changed.notify_all();
            mem::take(&mut pipeline.queues)
        };
        drop(discarded);

        // Joining could block on a worker stuck in a command, it's left to exit on its own
        self.worker = None;
    }

    pub fn policy(&self) -> ThreadingPolicy {
        self.policy
    }

    pub fn state(&self) -> RenderThreadState {
        self.shared.pipeline.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.shared.pipeline.lock().running
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        self.shared.stats.clone()
    }

    /// Creates a handle that can submit commands from anywhere, including other commands.
    pub fn handle(&self) -> RenderThreadHandle {
        RenderThreadHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Default for RenderThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if !self.is_running() {
            return;
        }

        if thread::panicking() {
            self.abandon();
        } else {
            self.stop();
        }
    }
}

/// Cloneable submission-only access to a [`RenderThread`].
#[derive(Clone)]
pub struct RenderThreadHandle {
    shared: Arc<Shared>,
}

impl RenderThreadHandle {
    /// See [`RenderThread::submit`].
    pub fn submit(&self, command: impl FnOnce() + Send + 'static) {
        self.shared.submit(Box::new(command));
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        self.shared.stats.clone()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let _guard = AbortOnPanic;
    trace!("Render thread running");

    let mut pipeline = shared.pipeline.lock();
    loop {
        while pipeline.state != RenderThreadState::Kick && !pipeline.shutdown {
            shared.state_changed.wait(&mut pipeline);
        }
        if pipeline.state != RenderThreadState::Kick {
            break;
        }

        shared.set_state(&mut pipeline, RenderThreadState::Busy);
        shared.execute_render_queue(&mut pipeline);
        shared.set_state(&mut pipeline, RenderThreadState::Idle);
    }

    trace!("Render thread finished");
}

/// Takes the process down if the render worker unwinds. The main thread waits on the worker
/// without a timeout, so a dead worker would otherwise hang the engine.
struct AbortOnPanic;

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("A render command has panicked on the render thread, aborting");
            process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    const POLICIES: [ThreadingPolicy; 3] = [
        ThreadingPolicy::None,
        ThreadingPolicy::SingleThreaded,
        ThreadingPolicy::MultiThreaded,
    ];

    type Log = Arc<Mutex<Vec<u32>>>;

    fn push(rt: &RenderThread, log: &Log, value: u32) {
        let log = log.clone();
        rt.submit(move || log.lock().push(value));
    }

    fn started(policy: ThreadingPolicy) -> RenderThread {
        let mut rt = RenderThread::new();
        rt.start(policy);
        rt
    }

    #[test]
    fn one_two_three() {
        for policy in POLICIES {
            let rt = started(policy);
            let log = Log::default();

            push(&rt, &log, 1);
            push(&rt, &log, 2);
            push(&rt, &log, 3);
            rt.flush();
            rt.wait_until_render_complete();

            assert_eq!(*log.lock(), vec![1, 2, 3], "policy {policy:?}");
        }
    }

    #[test]
    fn hundred_cycles_keep_fifo_blocks() {
        for policy in POLICIES {
            let rt = started(policy);
            let log = Log::default();

            for cycle in 0..100 {
                rt.wait_until_render_complete();
                for i in 0..3 {
                    push(&rt, &log, cycle * 3 + i);
                }
                rt.next_frame();
            }
            rt.wait_until_render_complete();

            assert_eq!(*log.lock(), (0..300).collect::<Vec<_>>(), "policy {policy:?}");
            assert_eq!(rt.stats().executed_commands(), 3);
        }
    }

    #[test]
    fn commands_run_exactly_once() {
        for policy in POLICIES {
            let rt = started(policy);
            let counters: Vec<_> = (0..50).map(|_| Arc::new(AtomicUsize::new(0))).collect();

            for counter in &counters {
                let counter = counter.clone();
                rt.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }

            // Plenty of empty passes afterwards must not replay anything
            for _ in 0..10 {
                rt.pump();
            }

            assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
        }
    }

    #[test]
    fn later_submissions_wait_for_the_next_pass() {
        for policy in POLICIES {
            let rt = started(policy);
            let log = Log::default();

            push(&rt, &log, 1);
            push(&rt, &log, 2);
            rt.next_frame();
            push(&rt, &log, 100);
            push(&rt, &log, 101);
            push(&rt, &log, 102);
            rt.wait_until_render_complete();

            assert_eq!(*log.lock(), vec![1, 2], "policy {policy:?}");
            assert_eq!(rt.stats().executed_commands(), 2);

            rt.pump();
            assert_eq!(*log.lock(), vec![1, 2, 100, 101, 102], "policy {policy:?}");
            assert_eq!(rt.stats().executed_commands(), 3);
        }
    }

    #[test]
    fn policies_are_observably_equivalent() {
        fn script(policy: ThreadingPolicy) -> (Vec<u32>, u64) {
            let rt = started(policy);
            let log = Log::default();

            for frame in 0..20u32 {
                rt.wait_until_render_complete();
                for i in 0..(frame % 5) {
                    push(&rt, &log, frame * 10 + i);
                }
                rt.next_frame();
            }
            rt.wait_until_render_complete();

            let result = log.lock().clone();
            (result, rt.stats().render_passes())
        }

        let reference = script(ThreadingPolicy::SingleThreaded);
        assert_eq!(script(ThreadingPolicy::MultiThreaded), reference);
        assert_eq!(script(ThreadingPolicy::None), reference);
    }

    #[test]
    fn stop_drains_pending_work() {
        const K: usize = 25;

        for policy in POLICIES {
            let mut rt = started(policy);
            let counter = Arc::new(AtomicUsize::new(0));

            for _ in 0..K {
                let counter = counter.clone();
                rt.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }

            rt.stop();
            assert_eq!(counter.load(Ordering::SeqCst), K, "policy {policy:?}");
            assert!(!rt.is_running());
        }
    }

    #[test]
    fn stop_drains_work_submitted_by_commands() {
        for policy in POLICIES {
            let mut rt = started(policy);
            let log = Log::default();
            let handle = rt.handle();

            let inner_log = log.clone();
            rt.submit(move || {
                inner_log.lock().push(1);
                let inner_log = inner_log.clone();
                handle.submit(move || inner_log.lock().push(2));
            });

            rt.stop();
            assert_eq!(*log.lock(), vec![1, 2], "policy {policy:?}");
        }
    }

    #[test]
    fn wait_blocks_until_idle() {
        const SLEEP: Duration = Duration::from_millis(50);

        let rt = started(ThreadingPolicy::MultiThreaded);
        let done = Arc::new(AtomicBool::new(false));

        let done2 = done.clone();
        rt.submit(move || {
            thread::sleep(SLEEP);
            done2.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        rt.next_frame();
        rt.wait_until_render_complete();

        assert!(start.elapsed() >= SLEEP);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(rt.state(), RenderThreadState::Idle);
        assert!(rt.stats().work_time() >= SLEEP);
    }

    #[test]
    fn commands_run_on_the_render_thread() {
        let rt = started(ThreadingPolicy::MultiThreaded);
        let name = Arc::new(Mutex::new(None));

        let name2 = name.clone();
        rt.submit(move || *name2.lock() = thread::current().name().map(String::from));
        rt.pump();

        assert_eq!(name.lock().as_deref(), Some("Render Thread"));
    }

    #[test]
    fn single_threaded_runs_inline() {
        let rt = started(ThreadingPolicy::SingleThreaded);
        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));

        let ran_on2 = ran_on.clone();
        rt.submit(move || *ran_on2.lock() = Some(thread::current().id()));
        rt.next_frame();

        // No wait needed, execution already happened
        assert_eq!(*ran_on.lock(), Some(caller));
        assert_eq!(rt.state(), RenderThreadState::Idle);
    }

    #[test]
    fn state_lifecycle() {
        let mut rt = RenderThread::new();
        assert_eq!(rt.state(), RenderThreadState::Uninitialized);
        assert!(!rt.is_running());

        rt.start(ThreadingPolicy::MultiThreaded);
        assert_eq!(rt.policy(), ThreadingPolicy::MultiThreaded);
        assert_eq!(rt.state(), RenderThreadState::Idle);
        assert!(rt.is_running());

        rt.pump();
        assert_eq!(rt.state(), RenderThreadState::Idle);

        rt.stop();
        assert!(!rt.is_running());
    }

    #[test]
    #[should_panic(expected = "render thread started twice")]
    fn double_start_panics() {
        let mut rt = RenderThread::new();
        rt.start(ThreadingPolicy::SingleThreaded);
        rt.start(ThreadingPolicy::SingleThreaded);
    }

    #[test]
    #[should_panic(expected = "isn't running")]
    fn submit_before_start_panics() {
        let rt = RenderThread::new();
        rt.submit(|| {});
    }

    #[test]
    #[should_panic(expected = "stopped while not running")]
    fn double_stop_panics() {
        let mut rt = started(ThreadingPolicy::SingleThreaded);
        rt.stop();
        rt.stop();
    }

    #[test]
    fn drop_stops_and_drains() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let rt = started(ThreadingPolicy::MultiThreaded);
            let counter = counter.clone();
            rt.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_command_runs_nothing_else() {
        for policy in [ThreadingPolicy::None, ThreadingPolicy::SingleThreaded] {
            let follow_ups = Arc::new(AtomicUsize::new(0));

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let rt = started(policy);
                let handle = rt.handle();
                let counter = follow_ups.clone();
                rt.submit(move || {
                    handle.submit(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                    panic!("render command failed");
                });
                rt.next_frame();
            }));

            assert!(result.is_err(), "{policy:?}");
            assert_eq!(follow_ups.load(Ordering::SeqCst), 0, "{policy:?}");
        }
    }

    #[test]
    fn policy_from_config_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            threading: ThreadingPolicy,
        }

        let parsed: Wrapper = toml::from_str("threading = \"single-threaded\"").unwrap();
        assert_eq!(parsed.threading, ThreadingPolicy::SingleThreaded);
        assert!(!parsed.threading.is_threaded());
        assert_eq!(ThreadingPolicy::default(), ThreadingPolicy::MultiThreaded);
    }
}
