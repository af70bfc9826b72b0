//! What happens to a failure raised on a worker thread

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::{TaskError, TaskResult};
use crate::worker::guarded;

/// Callback receiving failures from tasks or consumers.
///
/// Returning `Ok(())` absorbs the failure. Returning `Err` makes the returned
/// error unhandled.
pub type ErrorHandler = Arc<dyn Fn(TaskError) -> TaskResult + Send + Sync + 'static>;

/// Policy for failures raised on a worker thread
#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Pass every failure to the handler
    Handler(ErrorHandler),
    /// Treat every failure as unhandled. Unless retrieved through
    /// `shutdown`, an unhandled failure aborts the process when the owning
    /// queue is dropped.
    #[default]
    Abort,
}

impl ErrorPolicy {
    /// Build a handler policy from a closure
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(TaskError) -> TaskResult + Send + Sync + 'static,
    {
        ErrorPolicy::Handler(Arc::new(f))
    }

    /// Handler policy that logs each failure at `warn` and keeps going
    pub fn log_and_continue() -> Self {
        Self::handler(|err| {
            warn!(error = %err, "ErrorPolicy: absorbed failure");
            Ok(())
        })
    }

    /// Route one failure through the policy.
    ///
    /// Returns the error that remains unhandled, if any. A panicking handler
    /// counts as a failing one.
    pub fn handle(&self, err: TaskError) -> TaskResult {
        match self {
            ErrorPolicy::Handler(handler) => guarded(|| handler(err)),
            ErrorPolicy::Abort => Err(err),
        }
    }

    /// Check whether failures are fatal under this policy
    pub fn is_abort(&self) -> bool {
        matches!(self, ErrorPolicy::Abort)
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Handler(_) => f.write_str("ErrorPolicy::Handler(..)"),
            ErrorPolicy::Abort => f.write_str("ErrorPolicy::Abort"),
        }
    }
}
