//! Logger - builds tag records and hands them to a dispatcher
//!
//! Every record starts with `time`, `level` and `message`, followed by the
//! logger's own tags. Building the record happens on the calling thread;
//! delivery to consumers happens on the dispatcher's worker thread.

use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;

use chrono::Utc;
use dispatchq::{CoreError, Dispatcher, ErrorPolicy, QueueConfig, Subscription, TaskResult};
use tracing::debug;

use crate::consumers::Sink;
use crate::formatter::{DefaultFormatter, Formatter};
use crate::level::Level;
use crate::payload::Payload;
use crate::tags::{KEY_ERROR_MESSAGE, KEY_ERROR_TYPE, KEY_LEVEL, KEY_MESSAGE, KEY_TIME, Tags};

/// Logger whose records are shared between consumers behind an `Arc`
pub type SharedTagsLogger = Logger<Arc<Tags>>;

/// Cheaply cloneable front-end over one dispatcher
#[derive(Clone)]
pub struct Logger<P: Payload = Tags> {
    dispatcher: Dispatcher<P>,
    tags: Tags,
    min_level: Level,
    formatter: Arc<dyn Formatter>,
}

impl<P: Payload> Logger<P> {
    /// Create a logger with its own dispatcher
    pub fn new(config: QueueConfig, policy: ErrorPolicy) -> Result<Self, CoreError> {
        debug!(name = %config.name, "Logger::new: called");
        let dispatcher = Dispatcher::with_config(config, policy)?;
        Ok(Self::with_dispatcher(dispatcher, Tags::new()))
    }

    /// Create a logger publishing to an existing dispatcher
    pub fn with_dispatcher(dispatcher: Dispatcher<P>, tags: Tags) -> Self {
        Self {
            dispatcher,
            tags,
            min_level: Level::Unknown,
            formatter: Arc::new(DefaultFormatter),
        }
    }

    /// Replace the formatter used by [`logf`](Self::logf)
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Drop records below `level` at the call site
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Child logger on the same dispatcher with `tags` appended
    pub fn extend(&self, tags: Tags) -> Self {
        let mut child = self.clone();
        child.tags.extend_back(tags);
        child
    }

    /// Child logger carrying `error_type` and `error_message` tags
    pub fn extend_error<E: Error + ?Sized>(&self, err: &E) -> Self {
        self.extend(
            Tags::new()
                .with(KEY_ERROR_TYPE, std::any::type_name::<E>())
                .with(KEY_ERROR_MESSAGE, err.to_string()),
        )
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.log_tags(level, message, Tags::new());
    }

    /// Log with `extra` tags placed after the logger's own tags
    pub fn log_tags(&self, level: Level, message: impl Into<String>, extra: Tags) {
        if !self.enabled(level) {
            return;
        }
        let mut record = Tags::new()
            .with(KEY_TIME, Utc::now())
            .with(KEY_LEVEL, level)
            .with(KEY_MESSAGE, message.into());
        record.extend_back(self.tags.clone());
        record.extend_back(extra);
        self.dispatcher.push(P::from_tags(record));
    }

    /// Format `template` with the logger's formatter, then log
    pub fn logf(&self, level: Level, template: &str, args: &[&dyn Display]) {
        if !self.enabled(level) {
            return;
        }
        let message = self.formatter.format(template, args);
        self.log(level, message);
    }

    pub fn unknown(&self, message: impl Into<String>) {
        self.log(Level::Unknown, message);
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message);
    }

    /// Register a consumer for every record logged after this call
    pub fn subscribe<F>(&self, consumer: F) -> Subscription
    where
        F: FnMut(&P) -> TaskResult + Send + 'static,
    {
        self.dispatcher.subscribe(consumer)
    }

    /// Subscribe a [`Sink`]
    pub fn attach<S: Sink>(&self, mut sink: S) -> Subscription {
        self.subscribe(move |payload: &P| sink.consume(payload.tags()))
    }

    /// Block until every record logged so far has been delivered
    pub fn flush(&self) -> TaskResult {
        self.dispatcher.flush()
    }
}

impl<P: Payload> fmt::Debug for Logger<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("tags", &self.tags.len())
            .field("min_level", &self.min_level)
            .finish()
    }
}
