//! DispatchQ - ordered asynchronous dispatch on dedicated worker threads
//!
//! Any number of producer threads hand work to a single consumer thread
//! without blocking. Per-producer order is preserved, and every task runs on
//! the same thread in one total order. A publish/subscribe [`Dispatcher`] is
//! built on top.
//!
//! # Architecture
//!
//! ```text
//!  producers ──push──► OrderedQueue ──pop──► Worker thread
//!  (any thread)        (lock-free MPSC)       └─ TaskQueue::run
//!                                                  ├─ task()
//!                                                  ├─ task()
//!                                                  └─ Err/panic ─► ErrorPolicy
//!
//!  Dispatcher<T> = TaskQueue + subscriber set owned by the worker
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dispatchq::{Dispatcher, ErrorPolicy};
//!
//! let dispatcher = Dispatcher::new(ErrorPolicy::log_and_continue())?;
//! let subscription = dispatcher.subscribe(|line: &String| {
//!     println!("{}", line);
//!     Ok(())
//! });
//! dispatcher.push("hello".to_string());
//! drop(subscription); // blocks until "hello" has been delivered
//! ```

pub mod config;
mod dispatcher;
mod error;
mod ordered_queue;
mod policy;
mod task_queue;
mod worker;

pub use config::{DEFAULT_PARK_TIMEOUT_MS, DEFAULT_QUEUE_NAME, IdleStrategy, QueueConfig};
pub use dispatcher::{Consumer, Dispatcher, SubscriberId, Subscription, SubscriptionState};
pub use error::{CoreError, TaskError, TaskResult};
pub use ordered_queue::{OrderedQueue, QueueSender};
pub use policy::{ErrorHandler, ErrorPolicy};
pub use task_queue::{Task, TaskQueue};
pub use worker::Worker;
