//! Configuration for task queues and dispatchers

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default worker thread name
pub const DEFAULT_QUEUE_NAME: &str = "dispatchq";

/// Default park timeout for [`IdleStrategy::Park`] (milliseconds)
pub const DEFAULT_PARK_TIMEOUT_MS: u64 = 10;

/// What the worker thread does when the queue is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum IdleStrategy {
    /// Yield to the scheduler and poll again (lowest latency, burns CPU)
    Yield,
    /// Park until a producer pushes, or until the timeout elapses
    Park {
        #[serde(default = "default_park_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_park_timeout_ms() -> u64 {
    DEFAULT_PARK_TIMEOUT_MS
}

impl IdleStrategy {
    /// Park strategy with the default timeout
    pub fn park() -> Self {
        IdleStrategy::Park {
            timeout_ms: DEFAULT_PARK_TIMEOUT_MS,
        }
    }

    /// Park timeout, if this strategy parks
    pub fn park_timeout(&self) -> Option<Duration> {
        match self {
            IdleStrategy::Yield => None,
            IdleStrategy::Park { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
        }
    }
}

impl Default for IdleStrategy {
    fn default() -> Self {
        IdleStrategy::Yield
    }
}

/// Settings for one worker-backed queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Worker thread name
    #[serde(default = "default_name")]
    pub name: String,

    /// Idle behaviour of the worker loop
    #[serde(default)]
    pub idle: IdleStrategy,
}

fn default_name() -> String {
    DEFAULT_QUEUE_NAME.to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            idle: IdleStrategy::default(),
        }
    }
}

impl QueueConfig {
    /// Config with the given worker name and default idle strategy
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Replace the idle strategy
    pub fn with_idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }
}
