//! Test fixtures for worker integration tests
//!
//! Every fixture task appends to a shared [`EventLog`] so tests can assert on
//! execution order without reading logs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use resonance_worker::tasks::{
    Arguments, ParameterKind, ParameterSet, ParameterSpec, ParameterValue, Progress, Task,
    TaskDescriptor, TaskManager, TaskManagerOptions, TaskMetadata, TaskRegistration, TaskSchedule,
};
use resonance_worker::{WorkerError, WorkerResult};

/// How long a test waits for an expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Ordered record of what fixture tasks did
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.count(event) > 0
    }

    /// Wait until `predicate` holds for the recorded events
    pub async fn wait_for<F>(&self, predicate: F)
    where
        F: Fn(&[String]) -> bool,
    {
        let result = tokio::time::timeout(EVENT_TIMEOUT, async {
            while !predicate(&self.events()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "timed out, events so far: {:?}", self.events());
    }

    /// Wait until `event` has been recorded at least once
    pub async fn wait_for_event(&self, event: &str) {
        self.wait_for(|events| events.iter().any(|e| e == event))
            .await;
    }
}

/// Wait until `condition` holds for the manager
pub async fn wait_until<F>(manager: &TaskManager, condition: F)
where
    F: Fn(&TaskManager) -> bool,
{
    let result = tokio::time::timeout(EVENT_TIMEOUT, async {
        while !condition(manager) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting on {:?}", manager);
}

/// Records its label each time it runs
pub struct RecordingTask {
    label: String,
    log: EventLog,
}

#[async_trait]
impl Task for RecordingTask {
    async fn run(
        &self,
        _args: ParameterSet,
        _progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        self.log.push(self.label.clone());
        Ok(())
    }
}

/// Registration of a [`RecordingTask`] recording its slug
pub fn recording(slug: &str, log: &EventLog) -> TaskRegistration {
    recording_with(TaskMetadata::new(slug, slug.to_uppercase()), log)
}

pub fn recording_with(metadata: TaskMetadata, log: &EventLog) -> TaskRegistration {
    let label = metadata.slug.clone();
    let log = log.clone();
    TaskRegistration::new(metadata, move |_| RecordingTask {
        label: label.clone(),
        log: log.clone(),
    })
}

/// Requires a `msg` and accepts an integer `times`; records `echo:<msg>` per repetition
pub struct EchoTask {
    log: EventLog,
}

#[async_trait]
impl Task for EchoTask {
    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("msg", "Text to record", ParameterKind::Text),
            ParameterSpec::optional("times", "Repetitions", ParameterKind::Integer)
                .with_default(1),
        ]
    }

    async fn run(
        &self,
        args: ParameterSet,
        _progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        let msg: String = args.value("msg")?;
        let times: u32 = args.value("times")?;
        for _ in 0..times {
            self.log.push(format!("echo:{}", msg));
        }
        Ok(())
    }
}

pub fn echo(log: &EventLog) -> TaskRegistration {
    let log = log.clone();
    TaskRegistration::new(TaskMetadata::new("echo", "Echo"), move |_| EchoTask {
        log: log.clone(),
    })
}

/// Always fails with an anticipated error
pub struct FailingTask;

#[async_trait]
impl Task for FailingTask {
    async fn run(
        &self,
        _args: ParameterSet,
        _progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        Err(WorkerError::task_failed("bad state"))
    }
}

pub fn failing() -> TaskRegistration {
    TaskRegistration::new(TaskMetadata::new("fail", "Failing task"), |_| FailingTask)
}

/// Panics inside its body
pub struct PanickingTask;

#[async_trait]
impl Task for PanickingTask {
    async fn run(
        &self,
        _args: ParameterSet,
        _progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        panic!("task exploded");
    }
}

pub fn panicking() -> TaskRegistration {
    TaskRegistration::new(TaskMetadata::new("panic", "Panicking task"), |_| {
        PanickingTask
    })
}

/// Released by the test to let a [`BlockingTask`] finish
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<Notify>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.0.notify_one();
    }
}

/// Runs until its gate opens. A cooperative one also returns on cancellation.
pub struct BlockingTask {
    log: EventLog,
    gate: Gate,
    cooperative: bool,
}

#[async_trait]
impl Task for BlockingTask {
    async fn run(
        &self,
        _args: ParameterSet,
        _progress: Progress,
        cancel: CancellationToken,
    ) -> WorkerResult<()> {
        self.log.push("block:start");
        if self.cooperative {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.log.push("block:cancelled");
                    return Err(WorkerError::Cancelled("gate abandoned".to_string()));
                }
                _ = self.gate.0.notified() => {}
            }
        } else {
            self.gate.0.notified().await;
        }
        self.log.push("block:done");
        Ok(())
    }
}

pub fn blocking(log: &EventLog, gate: &Gate, cooperative: bool) -> TaskRegistration {
    let log = log.clone();
    let gate = gate.clone();
    TaskRegistration::new(TaskMetadata::new("block", "Blocking task"), move |_| {
        BlockingTask {
            log: log.clone(),
            gate: gate.clone(),
            cooperative,
        }
    })
}

/// Reports a fixed sequence of progress values
pub struct ProgressTask;

#[async_trait]
impl Task for ProgressTask {
    async fn run(
        &self,
        _args: ParameterSet,
        progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        for percent in [25.0, 50.0, 75.0, 150.0] {
            progress.report(percent);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

impl TaskDescriptor for ProgressTask {
    fn metadata() -> TaskMetadata {
        TaskMetadata::new("progress", "Progress reporter")
    }
}

/// Queues one `echo` run per entry of its `messages` argument
pub struct FanOutTask {
    manager: TaskManager,
    log: EventLog,
}

#[async_trait]
impl Task for FanOutTask {
    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "messages",
            "Comma separated messages",
            ParameterKind::Text,
        )]
    }

    async fn run(
        &self,
        args: ParameterSet,
        _progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        let messages: String = args.value("messages")?;
        for msg in messages.split(',') {
            let arguments = Arguments::from([("msg".to_string(), ParameterValue::from(msg))]);
            self.manager
                .start_task("echo", Progress::noop(), arguments, None)?;
        }
        self.log.push("fanout:done");
        Ok(())
    }
}

pub fn fan_out(log: &EventLog) -> TaskRegistration {
    let log = log.clone();
    TaskRegistration::new(TaskMetadata::new("fanout", "Fan out"), move |manager| {
        FanOutTask {
            manager: manager.clone(),
            log: log.clone(),
        }
    })
}

/// Build a manager with no schedule and default options
pub fn manager(registrations: Vec<TaskRegistration>) -> TaskManager {
    TaskManager::new(
        registrations,
        TaskSchedule::new(),
        TaskManagerOptions::default(),
    )
    .expect("unique slugs")
}

/// Text arguments from name/value pairs
pub fn text_args(pairs: &[(&str, &str)]) -> Arguments {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), ParameterValue::from(*value)))
        .collect()
}

/// Create a temporary media library directory
pub fn create_temp_music_library() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a file with the given content inside `dir`, creating parent directories
pub fn create_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(&path, content).expect("Failed to write test file");
    path
}
