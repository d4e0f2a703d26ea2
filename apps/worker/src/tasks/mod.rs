//! Task scheduling and execution
//!
//! - [`parameter`]: declared parameters, loosely typed arguments and binding
//! - [`task`]: the [`Task`] contract, metadata and progress reporting
//! - [`schedule`]: recurring delays per task slug
//! - [`manager`]: the queue, the scheduler loop and the executor

pub mod manager;
pub mod parameter;
mod registry;
pub mod schedule;
pub mod task;

pub use manager::{Lifecycle, TaskManager, TaskManagerOptions, DEFAULT_POLL_INTERVAL};
pub use parameter::{
    bind_arguments, validate_argument_names, Arguments, BoundParameter, FromParameter,
    Identifiable, ParameterKind, ParameterSet, ParameterSpec, ParameterValue,
};
pub use registry::RunningTask;
pub use schedule::TaskSchedule;
pub use task::{Progress, Task, TaskDescriptor, TaskFactory, TaskMetadata, TaskRegistration};
