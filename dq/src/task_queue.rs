//! TaskQueue - a totally ordered execution stream on one worker thread
//!
//! Any number of threads push closures; a single worker thread pops them from
//! an [`OrderedQueue`] and runs them one at a time, in push order. State that
//! only tasks touch can be handed to the queue at construction and is then
//! owned by the worker thread, so tasks mutate it without locking.
//!
//! # Worker loop
//!
//! ```text
//! loop {
//!   ├─► stopping = stop flag
//!   ├─► drain: pop every available task, run it inside a guard
//!   │       └─ Err / panic ─► ErrorPolicy::handle
//!   │                           ├─ absorbed  ─► next task
//!   │                           └─ unhandled ─► discard mode, worker returns Err
//!   ├─► stopping? ─► exit (so the last drain ran after stop was requested)
//!   └─► idle (yield, or park until a push)
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use futures::channel::oneshot;
use tracing::{debug, error, warn};

use crate::config::{IdleStrategy, QueueConfig};
use crate::error::{CoreError, TaskError, TaskResult};
use crate::ordered_queue::{OrderedQueue, QueueSender};
use crate::policy::ErrorPolicy;
use crate::worker::{Worker, guarded};

/// A deferred unit of work, run exactly once on the worker thread
pub type Task<S = ()> = Box<dyn FnOnce(&mut S) -> TaskResult + Send + 'static>;

/// Ordered task executor backed by one dedicated thread.
///
/// Dropping the queue requests a stop, runs every task pushed so far and joins
/// the thread. An unhandled failure that was not retrieved with
/// [`shutdown`](Self::shutdown) aborts the process at that point.
pub struct TaskQueue<S = ()> {
    name: String,
    sender: QueueSender<Task<S>>,
    stop: Arc<AtomicBool>,
    worker: Worker,
}

impl TaskQueue<()> {
    /// Create a queue with the default config
    pub fn new(policy: ErrorPolicy) -> Result<Self, CoreError> {
        Self::with_config(QueueConfig::default(), policy)
    }

    /// Create a queue with an explicit config
    pub fn with_config(config: QueueConfig, policy: ErrorPolicy) -> Result<Self, CoreError> {
        Self::with_state((), config, policy)
    }
}

impl<S: Send + 'static> TaskQueue<S> {
    /// Create a queue whose worker thread owns `state`.
    ///
    /// Tasks pushed with [`push_with`](Self::push_with) get `&mut S`.
    pub fn with_state(state: S, config: QueueConfig, policy: ErrorPolicy) -> Result<Self, CoreError> {
        debug!(name = %config.name, idle = ?config.idle, ?policy, "TaskQueue::with_state: called");
        let queue = OrderedQueue::new();
        let sender = queue.sender();
        let stop = Arc::new(AtomicBool::new(false));

        let runner = Runner {
            name: config.name.clone(),
            queue,
            state,
            policy,
            idle: config.idle,
            stop: Arc::clone(&stop),
        };
        let worker = Worker::spawn(config.name.clone(), move || runner.run())?;

        Ok(Self {
            name: config.name,
            sender,
            stop,
            worker,
        })
    }

    /// Push a zero-argument task; never blocks
    pub fn push<F>(&self, task: F)
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        self.push_with(move |_: &mut S| task());
    }

    /// Push a task that gets mutable access to the worker-owned state; never blocks
    pub fn push_with<F>(&self, task: F)
    where
        F: FnOnce(&mut S) -> TaskResult + Send + 'static,
    {
        self.sender.push(Box::new(task));
        self.worker.unpark();
    }

    /// Block until every task pushed before this call has run.
    ///
    /// Returns immediately when called from the worker thread itself.
    /// Returns [`TaskError::Discarded`] if the queue stopped running tasks
    /// after an unhandled failure.
    pub fn flush(&self) -> TaskResult {
        if self.is_worker_thread() {
            warn!(name = %self.name, "TaskQueue::flush: called from the worker thread, not waiting");
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        self.push(move || {
            let _ = tx.send(());
            Ok(())
        });
        futures::executor::block_on(rx).map_err(|_| TaskError::Discarded)
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the caller is running on this queue's worker thread
    pub fn is_worker_thread(&self) -> bool {
        self.worker.is_current()
    }

    /// Stop the queue after running every pending task, and return the
    /// unhandled failure that ended it, if any.
    pub fn shutdown(mut self) -> TaskResult {
        debug!(name = %self.name, "TaskQueue::shutdown: called");
        self.request_stop();
        self.worker.wait_and_rethrow()
    }

    fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.worker.unpark();
    }
}

impl<S> Drop for TaskQueue<S> {
    fn drop(&mut self) {
        debug!(name = %self.name, "TaskQueue::drop: stopping worker");
        self.stop.store(true, Ordering::Release);
        self.worker.unpark();
        // Worker::drop joins after the final drain.
    }
}

impl<S> fmt::Debug for TaskQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("stopping", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

/// Everything the worker thread owns
struct Runner<S> {
    name: String,
    queue: OrderedQueue<Task<S>>,
    state: S,
    policy: ErrorPolicy,
    idle: IdleStrategy,
    stop: Arc<AtomicBool>,
}

impl<S> Runner<S> {
    fn run(mut self) -> TaskResult {
        debug!(name = %self.name, "TaskQueue::run: worker loop started");
        loop {
            let stopping = self.stop.load(Ordering::Acquire);
            if let Err(err) = self.drain() {
                error!(name = %self.name, error = %err, "TaskQueue::run: unhandled task failure");
                self.discard_until_stopped();
                return Err(err);
            }
            if stopping {
                debug!(name = %self.name, "TaskQueue::run: stopped after final drain");
                return Ok(());
            }
            self.idle();
        }
    }

    fn drain(&mut self) -> TaskResult {
        while let Some(task) = self.queue.pop() {
            let state = &mut self.state;
            if let Err(err) = guarded(move || task(state)) {
                debug!(name = %self.name, error = %err, "TaskQueue::drain: task failed");
                self.policy.handle(err)?;
            }
        }
        Ok(())
    }

    /// Drop queued tasks without running them until a stop is requested.
    /// Dropping a task releases anything waiting on it.
    fn discard_until_stopped(&mut self) {
        let mut discarded = 0usize;
        loop {
            let stopping = self.stop.load(Ordering::Acquire);
            while let Some(task) = self.queue.pop() {
                drop(task);
                discarded += 1;
            }
            if stopping {
                break;
            }
            self.idle();
        }
        if discarded > 0 {
            warn!(name = %self.name, discarded, "TaskQueue::run: discarded tasks after unhandled failure");
        }
    }

    fn idle(&self) {
        match self.idle.park_timeout() {
            Some(timeout) => thread::park_timeout(timeout),
            None => thread::yield_now(),
        }
    }
}
