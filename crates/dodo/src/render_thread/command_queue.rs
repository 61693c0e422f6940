/// A deferred unit of render work.
pub type Command = Box<dyn FnOnce() + Send + 'static>;

/// Append-only buffer of [`Command`]s, drained in one go by [`CommandQueue::execute`].
///
/// The queue itself does no locking. The [`super::RenderThread`] owns two of these and swaps
/// their roles every frame, so at any point one queue is being filled and the other is being
/// drained, and no queue is touched by both threads at once.
#[derive(Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
    last_executed: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            last_executed: 0,
        }
    }

    /// Appends a command to the end of the queue.
    pub fn submit(&mut self, command: impl FnOnce() + Send + 'static) {
        self.commands.push(Box::new(command));
    }

    /// Appends an already boxed command to the end of the queue.
    pub fn submit_boxed(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Runs every queued command in submission order, on the calling thread, then leaves the
    /// queue empty. Returns the amount of executed commands.
    ///
    /// Panics raised by a command are not caught. The commands queued after it are dropped
    /// without running.
    pub fn execute(&mut self) -> usize {
        let count = self.commands.len();
        for command in self.commands.drain(..) {
            command();
        }
        self.last_executed = count;
        count
    }

    /// Amount of commands run by the most recently completed [`Self::execute`] pass.
    pub fn command_count(&self) -> usize {
        self.last_executed
    }

    /// Amount of commands waiting for the next [`Self::execute`] pass.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::CommandQueue;
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn executes_in_submission_order() {
        const N: usize = 64;

        let observed = Arc::new(Mutex::new(Vec::with_capacity(N)));
        let mut queue = CommandQueue::new();
        for i in 0..N {
            let observed = observed.clone();
            queue.submit(move || observed.lock().push(i));
        }

        assert_eq!(queue.len(), N);
        assert_eq!(queue.execute(), N);
        assert_eq!(*observed.lock(), (0..N).collect::<Vec<_>>());
    }

    #[test]
    fn each_command_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut queue = CommandQueue::new();

        for _ in 0..10 {
            let counter = counter.clone();
            queue.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        queue.execute();
        queue.execute();
        queue.execute();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn reuse_after_execute() {
        let mut queue = CommandQueue::with_capacity(4);
        queue.submit(|| {});
        queue.submit(|| {});
        queue.execute();

        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.command_count(), 2);

        let hit = Arc::new(AtomicUsize::new(0));
        let hit2 = hit.clone();
        queue.submit_boxed(Box::new(move || {
            hit2.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(queue.execute(), 1);
        assert_eq!(queue.command_count(), 1);
        assert_eq!(hit.load(Ordering::Relaxed), 1);

        // Empty passes are valid and reset the count
        assert_eq!(queue.execute(), 0);
        assert_eq!(queue.command_count(), 0);
    }
}
