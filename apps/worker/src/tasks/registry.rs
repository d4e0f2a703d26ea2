//! Registry entries and invocation records owned by the task manager

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::parameter::Arguments;
use super::task::{Progress, Task, TaskFactory, TaskMetadata};

/// A registered task type and its next automatic run
pub(crate) struct ManagedTask {
    pub(crate) metadata: TaskMetadata,
    pub(crate) factory: TaskFactory,
    /// `None` means the task is never enqueued automatically
    scheduled_at: Mutex<Option<Instant>>,
}

impl ManagedTask {
    pub(crate) fn new(
        metadata: TaskMetadata,
        factory: TaskFactory,
        scheduled_at: Option<Instant>,
    ) -> Self {
        Self {
            metadata,
            factory,
            scheduled_at: Mutex::new(scheduled_at),
        }
    }

    pub(crate) fn scheduled_at(&self) -> Option<Instant> {
        *self.scheduled_at.lock()
    }

    pub(crate) fn set_scheduled_at(&self, next: Option<Instant>) {
        *self.scheduled_at.lock() = next;
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.scheduled_at().is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for ManagedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTask")
            .field("slug", &self.metadata.slug)
            .field("scheduled_at", &self.scheduled_at())
            .finish_non_exhaustive()
    }
}

/// A pending request to run a managed task
pub(crate) struct QueuedTask {
    pub(crate) id: Uuid,
    pub(crate) task: Arc<ManagedTask>,
    pub(crate) progress: Progress,
    pub(crate) arguments: Arguments,
    pub(crate) cancel: Option<CancellationToken>,
}

impl QueuedTask {
    pub(crate) fn new(
        task: Arc<ManagedTask>,
        progress: Progress,
        arguments: Arguments,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            progress,
            arguments,
            cancel,
        }
    }
}

/// Snapshot of the task currently executing
#[derive(Clone)]
pub struct RunningTask {
    pub invocation: Uuid,
    pub metadata: TaskMetadata,
    pub task: Arc<dyn Task>,
    pub started_at: DateTime<Utc>,
}

impl fmt::Debug for RunningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningTask")
            .field("invocation", &self.invocation)
            .field("slug", &self.metadata.slug)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl Serialize for RunningTask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RunningTask", 4)?;
        state.serialize_field("invocation", &self.invocation)?;
        state.serialize_field("slug", &self.metadata.slug)?;
        state.serialize_field("name", &self.metadata.name)?;
        state.serialize_field("started_at", &self.started_at)?;
        state.end()
    }
}
