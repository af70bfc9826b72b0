//! Logpipe - structured logging on an ordered dispatch queue
//!
//! Records are ordered tag sets built on the calling thread and delivered to
//! consumers on a single worker thread, so consumers never need locking and
//! every consumer sees records in the same order.
//!
//! # Architecture
//!
//! ```text
//! Logger::info("...") ──► Tags [time, level, message, ...]
//!                              │
//!                              ▼
//!                     Dispatcher<P> worker
//!                       ├─► ConsoleConsumer
//!                       ├─► FileConsumer
//!                       └─► own_thread(sink) ──► sink worker
//! ```
//!
//! # Example
//!
//! ```ignore
//! use logpipe::{ConsoleConsumer, Logger, Tags};
//! use dispatchq::{ErrorPolicy, QueueConfig};
//!
//! let logger: Logger = Logger::new(QueueConfig::named("app"), ErrorPolicy::log_and_continue())?;
//! let _console = logger.attach(ConsoleConsumer::stdout(true));
//! logger.extend(Tags::new().with("user", "alice")).info("signed in");
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod consumers;
pub mod formatter;
pub mod level;
mod logger;
mod payload;
mod pipeline;
pub mod tags;

pub use bridge::{LogBridge, install};
pub use consumers::{ConsoleConsumer, FileConsumer, FileFormat, OwnThread, Sink, own_thread};
pub use formatter::{DefaultFormatter, Formatter, PrefixFormatter};
pub use level::Level;
pub use logger::{Logger, SharedTagsLogger};
pub use payload::Payload;
pub use pipeline::Pipeline;
pub use tags::{Tag, TagError, Tags, Value};
