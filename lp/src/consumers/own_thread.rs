//! Run a sink on a dedicated thread
//!
//! The dispatcher's worker only clones the payload into the sink's own
//! queue, so a slow sink does not hold up the other consumers. Dropping the
//! wrapper (for example when its subscription is released) drains that
//! queue before returning.

use dispatchq::{CoreError, ErrorPolicy, QueueConfig, TaskQueue, TaskResult};
use tracing::debug;

use crate::payload::Payload;

use super::Sink;

/// A sink owned by its own [`TaskQueue`] worker
pub struct OwnThread<S> {
    queue: TaskQueue<S>,
}

/// Move `sink` onto a new worker thread configured by `config`
pub fn own_thread<S: Sink>(sink: S, config: QueueConfig, policy: ErrorPolicy) -> Result<OwnThread<S>, CoreError> {
    debug!(name = %config.name, "own_thread: called");
    Ok(OwnThread {
        queue: TaskQueue::with_state(sink, config, policy)?,
    })
}

impl<S: Sink> OwnThread<S> {
    /// Queue a copy of `payload` for the sink; never blocks
    pub fn forward<P: Payload>(&self, payload: &P) {
        let payload = payload.clone();
        self.queue
            .push_with(move |sink: &mut S| sink.consume(payload.tags()));
    }

    /// Consumer closure suitable for `Logger::subscribe`
    pub fn into_consumer<P: Payload>(self) -> impl FnMut(&P) -> TaskResult + Send + 'static {
        move |payload: &P| {
            self.forward(payload);
            Ok(())
        }
    }

    /// Block until every forwarded record has reached the sink
    pub fn flush(&self) -> TaskResult {
        self.queue.flush()
    }

    /// Drain and stop, returning the failure that stopped the sink, if any
    pub fn shutdown(self) -> TaskResult {
        self.queue.shutdown()
    }
}
