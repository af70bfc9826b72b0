//! Worker - one dedicated thread running one callback
//!
//! A callback failure (returned `Err` or panic) is either handed to the
//! emergency handler on the worker thread, or kept until someone calls
//! [`Worker::wait_and_rethrow`]. A failure nobody retrieves aborts the process
//! when the worker is dropped. A worker dropped on its own thread is detached,
//! and the thread aborts by itself if its callback then fails.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, error, warn};

use crate::error::{CoreError, TaskError, TaskResult};

/// Run a closure, turning a panic into a [`TaskError::Panicked`]
pub(crate) fn guarded<F>(f: F) -> TaskResult
where
    F: FnOnce() -> TaskResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(TaskError::from_panic(payload)),
    }
}

/// Owner of a background thread executing a single callback
pub struct Worker {
    name: String,
    handle: Option<JoinHandle<TaskResult>>,
    detached: Arc<AtomicBool>,
}

impl Worker {
    /// Spawn a worker without an emergency handler.
    ///
    /// A failing callback must be retrieved with [`wait_and_rethrow`](Self::wait_and_rethrow),
    /// otherwise dropping the worker aborts the process.
    pub fn spawn<F>(name: impl Into<String>, callback: F) -> Result<Self, CoreError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        Self::start(name.into(), callback, None::<fn(TaskError) -> TaskResult>)
    }

    /// Spawn a worker whose callback failures are passed to `emergency`.
    ///
    /// The handler runs on the worker thread. If it fails too, its failure is
    /// the one that is kept.
    pub fn with_emergency<F, E>(name: impl Into<String>, callback: F, emergency: E) -> Result<Self, CoreError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
        E: FnOnce(TaskError) -> TaskResult + Send + 'static,
    {
        Self::start(name.into(), callback, Some(emergency))
    }

    fn start<F, E>(name: String, callback: F, emergency: Option<E>) -> Result<Self, CoreError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
        E: FnOnce(TaskError) -> TaskResult + Send + 'static,
    {
        if name.contains('\0') {
            return Err(CoreError::InvalidName(name));
        }
        debug!(%name, has_emergency = emergency.is_some(), "Worker::start: spawning thread");

        let detached = Arc::new(AtomicBool::new(false));
        let thread_detached = Arc::clone(&detached);
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = match guarded(callback) {
                    Ok(()) => Ok(()),
                    Err(err) => match emergency {
                        Some(handler) => guarded(move || handler(err)),
                        None => Err(err),
                    },
                };
                if let Err(e) = &result
                    && thread_detached.load(Ordering::Acquire)
                {
                    // Nobody is left to join this thread
                    error!(name = %thread_name, error = %e, "Worker: unhandled failure after detach, aborting");
                    std::process::abort();
                }
                result
            })
            .map_err(CoreError::Spawn)?;

        Ok(Self {
            name,
            handle: Some(handle),
            detached,
        })
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the worker thread, or `None` once it has been joined
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }

    /// Check whether the caller is running on this worker's thread
    pub fn is_current(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }

    /// Wake the worker thread if it is parked
    pub fn unpark(&self) {
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Check whether the callback has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Join the thread and return the callback's unhandled failure, if any.
    ///
    /// The failure is handed out once; later calls return `Ok(())`.
    pub fn wait_and_rethrow(&mut self) -> TaskResult {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            warn!(name = %self.name, "Worker::wait_and_rethrow: called from the worker thread, not joining");
            self.handle = Some(handle);
            return Ok(());
        }
        debug!(name = %self.name, "Worker::wait_and_rethrow: joining");
        match handle.join() {
            Ok(result) => result,
            // The thread body already catches panics; this only covers a panicking handler wrapper.
            Err(payload) => Err(TaskError::from_panic(payload)),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.is_current() {
            warn!(name = %self.name, "Worker::drop: dropped on its own thread, detaching");
            self.detached.store(true, Ordering::Release);
            return;
        }
        if let Err(e) = self.wait_and_rethrow() {
            error!(name = %self.name, error = %e, "Worker::drop: unhandled worker failure, aborting");
            std::process::abort();
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
