//! Resonance worker library
//!
//! Exposes the task manager, the built-in jobs and the task control routes
//! for use by the worker binary and integration tests.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod tasks;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorResponse, ErrorSeverity, WorkerError, WorkerResult};
pub use tasks::{
    Arguments, ParameterKind, ParameterSet, ParameterSpec, ParameterValue, Progress, Task,
    TaskDescriptor, TaskManager, TaskManagerOptions, TaskMetadata, TaskRegistration, TaskSchedule,
};
