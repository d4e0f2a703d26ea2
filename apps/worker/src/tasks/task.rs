//! The contract every schedulable unit of work implements

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::manager::TaskManager;
use super::parameter::{ParameterSet, ParameterSpec};
use crate::error::WorkerResult;

/// A named, parameterized, cancellable unit of long-running work.
///
/// A fresh instance is created for every run. Implementations should observe
/// `cancel` at reasonable intervals: the manager never interrupts a body that
/// ignores it. Anticipated failures (bad input, missing resources) are reported
/// with [`WorkerError::TaskFailed`](crate::error::WorkerError::TaskFailed);
/// anything else is treated as an unexpected error.
#[async_trait]
pub trait Task: Send + Sync {
    /// Parameters this task accepts. Called before every run to bind arguments.
    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Run the task with bound arguments
    async fn run(
        &self,
        args: ParameterSet,
        progress: Progress,
        cancel: CancellationToken,
    ) -> WorkerResult<()>;
}

/// Static description of a task type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskMetadata {
    /// Unique, stable identifier
    pub slug: String,
    /// Display name used in logs
    pub name: String,
    pub description: String,
    /// Startup ordering; higher runs first
    pub priority: i32,
    pub run_on_startup: bool,
    /// Internal tasks that should not be offered to users
    pub hidden: bool,
}

impl TaskMetadata {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            run_on_startup: false,
            hidden: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn run_on_startup(mut self) -> Self {
        self.run_on_startup = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Attaches metadata to a task type so it can be started by type
pub trait TaskDescriptor: Task {
    fn metadata() -> TaskMetadata;
}

/// Creates a fresh task instance for each run
pub type TaskFactory = Arc<dyn Fn(&TaskManager) -> Arc<dyn Task> + Send + Sync>;

/// A task type offered to the manager: its metadata plus a factory
#[derive(Clone)]
pub struct TaskRegistration {
    pub metadata: TaskMetadata,
    pub factory: TaskFactory,
}

impl TaskRegistration {
    pub fn new<F, T>(metadata: TaskMetadata, factory: F) -> Self
    where
        F: Fn(&TaskManager) -> T + Send + Sync + 'static,
        T: Task + 'static,
    {
        Self {
            metadata,
            factory: Arc::new(move |manager| Arc::new(factory(manager)) as Arc<dyn Task>),
        }
    }

    /// Register a described task type using its attached metadata
    pub fn of<T, F>(factory: F) -> Self
    where
        T: TaskDescriptor + 'static,
        F: Fn(&TaskManager) -> T + Send + Sync + 'static,
    {
        Self::new(T::metadata(), factory)
    }
}

impl fmt::Debug for TaskRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistration")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Receives a task's completion percentage
#[derive(Clone)]
pub struct Progress {
    sink: Option<Arc<dyn Fn(f32) + Send + Sync>>,
}

impl Progress {
    /// Report progress to a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(callback)),
        }
    }

    /// Discard every report
    pub fn noop() -> Self {
        Self { sink: None }
    }

    /// Publish reports on a watch channel holding the latest value
    pub fn watch() -> (Self, watch::Receiver<f32>) {
        let (tx, rx) = watch::channel(0.0);
        let progress = Self::new(move |value| {
            let _ = tx.send(value);
        });
        (progress, rx)
    }

    /// Report a percentage, clamped to `[0, 100]`
    pub fn report(&self, percent: f32) {
        if let Some(sink) = &self.sink {
            let value = if percent.is_nan() {
                0.0
            } else {
                percent.clamp(0.0, 100.0)
            };
            sink(value);
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("noop", &self.sink.is_none())
            .finish()
    }
}
