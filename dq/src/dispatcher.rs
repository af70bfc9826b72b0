//! Dispatcher - publish/subscribe broadcaster built on one TaskQueue
//!
//! Subscribe, unsubscribe and publish are all tasks on the same
//! [`TaskQueue`], so the subscriber set lives on the worker thread and is
//! never touched from anywhere else. Their relative order is exactly their
//! push order.
//!
//! # Subscription lifecycle
//!
//! ```text
//! subscribe() ──► PendingAdd ──(add task runs)──► Active
//!                                                   │
//!        release() / last handle dropped            │
//!           ├─► push remove task ◄──────────────────┘
//!           └─► block until the remove task signals
//!                                   │
//!                                   ▼
//!                                Removed
//! ```
//!
//! Once `release` returns, the consumer has been dropped and will not be
//! called again, so state it captured can be freed right away.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::channel::oneshot;
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::error::{CoreError, TaskResult};
use crate::policy::ErrorPolicy;
use crate::task_queue::TaskQueue;
use crate::worker::guarded;

/// Callback receiving every payload published while it is subscribed
pub type Consumer<T> = Box<dyn FnMut(&T) -> TaskResult + Send + 'static>;

/// Opaque identity of a subscriber within one dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Where a subscription is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Add task queued, not yet run by the worker
    PendingAdd,
    /// Receiving payloads
    Active,
    /// Removed from the subscriber set
    Removed,
}

const PENDING_ADD: u8 = 0;
const ACTIVE: u8 = 1;
const REMOVED: u8 = 2;

impl SubscriptionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            PENDING_ADD => SubscriptionState::PendingAdd,
            ACTIVE => SubscriptionState::Active,
            _ => SubscriptionState::Removed,
        }
    }
}

struct Entry<T> {
    consumer: Consumer<T>,
    state: Arc<AtomicU8>,
}

/// Subscriber set, owned by the worker thread
struct Subscribers<T> {
    consumers: BTreeMap<SubscriberId, Entry<T>>,
    policy: ErrorPolicy,
}

impl<T> Subscribers<T> {
    fn add(&mut self, id: SubscriberId, entry: Entry<T>) {
        // Released from the worker thread before the add ran
        if entry
            .state
            .compare_exchange(PENDING_ADD, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%id, "Dispatcher: subscriber released before add, skipping");
            return;
        }
        self.consumers.insert(id, entry);
        debug!(%id, count = self.consumers.len(), "Dispatcher: subscriber added");
    }

    fn remove(&mut self, id: SubscriberId) {
        if let Some(entry) = self.consumers.remove(&id) {
            entry.state.store(REMOVED, Ordering::Release);
        }
        debug!(%id, count = self.consumers.len(), "Dispatcher: subscriber removed");
    }

    /// Deliver to every consumer, each inside its own guard.
    ///
    /// A failing consumer does not stop delivery to the rest. The first
    /// failure the policy leaves unhandled is returned.
    fn dispatch(&mut self, payload: &T) -> TaskResult {
        let mut unhandled = None;
        for (id, entry) in self.consumers.iter_mut() {
            // Released on this thread; its remove task has not run yet
            if entry.state.load(Ordering::Acquire) == REMOVED {
                continue;
            }
            let consumer = &mut entry.consumer;
            if let Err(err) = guarded(|| consumer(payload)) {
                debug!(%id, error = %err, "Dispatcher::dispatch: consumer failed");
                if let Err(err) = self.policy.handle(err) {
                    unhandled.get_or_insert(err);
                }
            }
        }
        match unhandled {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Removal seam between a [`Subscription`] and its dispatcher
trait Unsubscribe: Send + Sync {
    /// Queue removal of `id`; the receiver fires once it has run
    fn unsubscribe(&self, id: SubscriberId) -> oneshot::Receiver<()>;

    /// Check whether the caller is the dispatcher's worker thread
    fn is_worker_thread(&self) -> bool;
}

struct Inner<T> {
    queue: TaskQueue<Subscribers<T>>,
    next_id: AtomicU64,
}

impl<T: Send + 'static> Unsubscribe for Inner<T> {
    fn unsubscribe(&self, id: SubscriberId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.queue.push_with(move |subs: &mut Subscribers<T>| {
            subs.remove(id);
            let _ = tx.send(());
            Ok(())
        });
        rx
    }

    fn is_worker_thread(&self) -> bool {
        self.queue.is_worker_thread()
    }
}

/// Broadcaster of payloads of type `T` to subscribed consumers.
///
/// Cloning yields another handle to the same dispatcher. The worker stops
/// after the last handle is dropped, once every pending task has run.
pub struct Dispatcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Create a dispatcher with the default queue config
    pub fn new(policy: ErrorPolicy) -> Result<Self, CoreError> {
        Self::with_config(QueueConfig::default(), policy)
    }

    /// Create a dispatcher with an explicit queue config.
    ///
    /// `policy` receives both consumer failures and failures of the
    /// dispatcher's own tasks.
    pub fn with_config(config: QueueConfig, policy: ErrorPolicy) -> Result<Self, CoreError> {
        debug!(name = %config.name, "Dispatcher::with_config: called");
        let subscribers = Subscribers {
            consumers: BTreeMap::new(),
            policy: policy.clone(),
        };
        let queue = TaskQueue::with_state(subscribers, config, policy)?;
        Ok(Self {
            inner: Arc::new(Inner {
                queue,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Register a consumer; returns without waiting for the add to run.
    ///
    /// Every payload pushed after this call returns reaches the consumer
    /// until the returned handle is released.
    pub fn subscribe<F>(&self, consumer: F) -> Subscription
    where
        F: FnMut(&T) -> TaskResult + Send + 'static,
    {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(AtomicU8::new(PENDING_ADD));
        let entry = Entry {
            consumer: Box::new(consumer),
            state: Arc::clone(&state),
        };
        debug!(%id, "Dispatcher::subscribe: queueing add");
        self.inner
            .queue
            .push_with(move |subs: &mut Subscribers<T>| {
                subs.add(id, entry);
                Ok(())
            });

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            handle: Arc::new(Handle {
                id,
                state,
                released: AtomicBool::new(false),
                dispatcher: weak,
            }),
        }
    }

    /// Schedule delivery of `payload` to every consumer subscribed when the
    /// dispatch task runs; never blocks
    pub fn push(&self, payload: T) {
        self.inner
            .queue
            .push_with(move |subs: &mut Subscribers<T>| subs.dispatch(&payload));
    }

    /// Block until everything pushed before this call has been delivered
    pub fn flush(&self) -> TaskResult {
        self.inner.queue.flush()
    }

    /// Check whether the caller is the dispatcher's worker thread
    pub fn is_worker_thread(&self) -> bool {
        self.inner.queue.is_worker_thread()
    }

    /// Stop the dispatcher and return the unhandled failure that ended it.
    ///
    /// Only the last handle can stop the worker; with other handles alive
    /// this waits for pending tasks and reports whether they ran.
    pub fn shutdown(self) -> TaskResult {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner.queue.shutdown(),
            Err(inner) => inner.queue.flush(),
        }
    }
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("queue", &self.inner.queue).finish()
    }
}

struct Handle {
    id: SubscriberId,
    state: Arc<AtomicU8>,
    released: AtomicBool,
    dispatcher: Weak<dyn Unsubscribe>,
}

impl Handle {
    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(dispatcher) = self.dispatcher.upgrade() else {
            // Dispatcher already shut down; its subscriber set is gone.
            self.state.store(REMOVED, Ordering::Release);
            return;
        };

        debug!(id = %self.id, "Subscription::release: queueing remove");
        let done = dispatcher.unsubscribe(self.id);
        if dispatcher.is_worker_thread() {
            debug!(id = %self.id, "Subscription::release: on worker thread, not waiting");
            self.state.store(REMOVED, Ordering::Release);
            return;
        }
        drop(dispatcher);

        if futures::executor::block_on(done).is_err() {
            warn!(id = %self.id, "Subscription::release: remove task discarded");
            self.state.store(REMOVED, Ordering::Release);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scoped, reference-counted subscription handle.
///
/// Dropping the last clone unsubscribes and blocks until the removal has
/// run on the worker thread. [`release`](Self::release) does the same
/// explicitly and is idempotent.
#[derive(Clone)]
pub struct Subscription {
    handle: Arc<Handle>,
}

impl Subscription {
    /// Identity of this subscriber
    pub fn subscriber_id(&self) -> SubscriberId {
        self.handle.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.handle.state.load(Ordering::Acquire))
    }

    /// Unsubscribe and wait until the consumer has been removed.
    ///
    /// Later calls, and the eventual drop, do nothing. When called from the
    /// dispatcher's worker thread (a consumer releasing a handle) the removal
    /// is queued but not awaited; the consumer is skipped by every dispatch
    /// from then on and dropped when the removal runs.
    pub fn release(&self) {
        self.handle.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.handle.id)
            .field("state", &self.state())
            .finish()
    }
}
