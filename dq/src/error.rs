//! Error types for the dispatch core

use std::any::Any;
use std::fmt::Display;

use thiserror::Error;

/// Result of running a task, a worker callback, or an error handler
pub type TaskResult = Result<(), TaskError>;

/// Failures raised while running work on a worker thread
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task failed: {0}")]
    Failed(String),

    #[error("Task discarded: the queue stopped after an unhandled failure")]
    Discarded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Build a plain failure from any displayable message
    pub fn msg(message: impl Display) -> Self {
        TaskError::Failed(message.to_string())
    }

    /// Convert a caught panic payload into a task error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked(message)
    }

    /// Check if this error came from a panic rather than a returned `Err`
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }
}

/// Errors raised synchronously while constructing a worker-backed component
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid worker name {0:?}: names must not contain NUL bytes")]
    InvalidName(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
