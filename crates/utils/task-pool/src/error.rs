use crate::class::PoolKey;
use std::{borrow::Cow, time::Duration};
use thiserror::Error;

/// Error delivered through a task's result channel.
#[derive(Debug, Error)]
#[error("task '{task_name}' failed: {kind}")]
#[non_exhaustive]
pub struct TaskError {
    pub task_name: String,
    #[source]
    pub kind: TaskErrorKind,
}

impl TaskError {
    pub fn new(task_name: impl Into<String>, kind: TaskErrorKind) -> Self {
        Self {
            task_name: task_name.into(),
            kind,
        }
    }

    pub fn execution<E>(task_name: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(
            task_name,
            TaskErrorKind::Execution {
                source: source.into(),
            },
        )
    }

    pub fn panic(task_name: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            task_name,
            TaskErrorKind::Panic {
                message: message.into(),
            },
        )
    }

    /// Returned by work that stopped early because its token fired.
    pub fn interrupted(task_name: impl Into<String>) -> Self {
        Self::new(task_name, TaskErrorKind::Interrupted)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.kind,
            TaskErrorKind::Cancelled | TaskErrorKind::Interrupted
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, TaskErrorKind::Timeout { .. })
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskErrorKind {
    #[error("execution error")]
    #[non_exhaustive]
    Execution {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("task panicked: {message}")]
    #[non_exhaustive]
    Panic { message: Cow<'static, str> },

    /// Cancelled through its handle before or while running.
    #[error("task was cancelled")]
    Cancelled,

    /// The work observed its cancellation token and stopped.
    #[error("task was interrupted")]
    Interrupted,

    /// Dropped from the queue by overflow eviction or pool shutdown.
    #[error("task was discarded before it ran")]
    Discarded,

    #[error("timed out after {timeout:?} waiting for the result")]
    #[non_exhaustive]
    Timeout { timeout: Duration },

    #[error("invalid task state: {message}")]
    #[non_exhaustive]
    InvalidState { message: Cow<'static, str> },
}

/// Error raised by pool and registry operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Bounded queue full and the overflow policy does not discard.
    #[error("pool {key} rejected the task: queue at capacity {capacity}")]
    Rejected { key: PoolKey, capacity: usize },

    #[error("pool {key} is shut down")]
    Shutdown { key: PoolKey },

    #[error("registry is shut down")]
    RegistryClosed,

    /// A task was handed to a pool a second time.
    #[error("task '{task_name}' has already been executed")]
    InvalidState { task_name: String },

    #[error("failed to spawn worker for pool {key}")]
    Spawn {
        key: PoolKey,
        #[source]
        source: std::io::Error,
    },
}

impl PoolError {
    pub fn rejected(key: PoolKey, capacity: usize) -> Self {
        Self::Rejected { key, capacity }
    }

    pub fn shutdown(key: PoolKey) -> Self {
        Self::Shutdown { key }
    }

    pub fn invalid_state(task_name: impl Into<String>) -> Self {
        Self::InvalidState {
            task_name: task_name.into(),
        }
    }
}

impl From<TaskErrorKind> for TaskError {
    fn from(kind: TaskErrorKind) -> Self {
        Self {
            task_name: String::from("unknown"),
            kind,
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

pub type PoolResult<T> = Result<T, PoolError>;
