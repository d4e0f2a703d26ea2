//! Background task manager
//!
//! Owns the task registry and a FIFO queue of invocations. A single loop
//! drains the queue one invocation at a time and, while idle, polls the
//! registry for tasks whose recurring delay has elapsed. Only one task body
//! ever executes at a time.
//!
//! Cancellation is cooperative: stopping the manager (or cancelling an
//! invocation's own token) asks the running body to return, but a body that
//! never checks its token keeps the worker busy until it finishes.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use resonance_shared_config::format_duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use super::parameter::{bind_arguments, Arguments};
use super::registry::{ManagedTask, QueuedTask, RunningTask};
use super::schedule::TaskSchedule;
use super::task::{Progress, TaskDescriptor, TaskMetadata, TaskRegistration};
use crate::error::{WorkerError, WorkerResult};

/// Default delay between two schedule checks while the queue is empty
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime options for the task manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskManagerOptions {
    /// Sleep between schedule checks while idle
    pub poll_interval: Duration,
    /// Once a run exceeds this, its cancellation token is fired.
    /// The manager still waits for the body to return.
    pub soft_timeout: Option<Duration>,
}

impl Default for TaskManagerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            soft_timeout: None,
        }
    }
}

/// Lifecycle of the manager loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    Stopping,
}

/// Handle to the task scheduler and executor. Cheap to clone.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

struct Inner {
    /// Registry in registration order
    tasks: Vec<Arc<ManagedTask>>,
    by_slug: HashMap<String, Arc<ManagedTask>>,
    schedule: TaskSchedule,
    options: TaskManagerOptions,
    state: Mutex<State>,
    /// Wakes the idle loop when something is enqueued
    wakeup: Notify,
    running: Mutex<Option<RunningTask>>,
}

struct State {
    lifecycle: Lifecycle,
    queue: VecDeque<QueuedTask>,
    shutdown: CancellationToken,
}

impl TaskManager {
    /// Build the registry.
    ///
    /// Registering two tasks with the same slug is rejected with
    /// [`WorkerError::DuplicateTask`]. Tasks with a configured delay get their
    /// first run scheduled `delay` from now.
    pub fn new(
        registrations: Vec<TaskRegistration>,
        schedule: TaskSchedule,
        options: TaskManagerOptions,
    ) -> WorkerResult<Self> {
        let now = Instant::now();
        let mut tasks = Vec::with_capacity(registrations.len());
        let mut by_slug = HashMap::with_capacity(registrations.len());

        for TaskRegistration { metadata, factory } in registrations {
            if by_slug.contains_key(&metadata.slug) {
                return Err(WorkerError::DuplicateTask(metadata.slug));
            }
            let scheduled_at = schedule.next_run(&metadata.slug, now);
            let slug = metadata.slug.clone();
            let task = Arc::new(ManagedTask::new(metadata, factory, scheduled_at));
            by_slug.insert(slug, Arc::clone(&task));
            tasks.push(task);
        }

        if tasks.is_empty() {
            info!("Task manager initiated without any tasks");
        } else {
            trace!(
                tasks = ?tasks.iter().map(|t| t.metadata.name.as_str()).collect::<Vec<_>>(),
                "Task manager initiated"
            );
        }

        Ok(Self {
            inner: Arc::new(Inner {
                tasks,
                by_slug,
                schedule,
                options,
                state: Mutex::new(State {
                    lifecycle: Lifecycle::Stopped,
                    queue: VecDeque::new(),
                    shutdown: CancellationToken::new(),
                }),
                wakeup: Notify::new(),
                running: Mutex::new(None),
            }),
        })
    }

    /// Spawn the background loop.
    ///
    /// Startup tasks are enqueued first, highest priority first. Fails with
    /// [`WorkerError::AlreadyRunning`] unless the manager is fully stopped.
    pub fn start(&self) -> WorkerResult<JoinHandle<()>> {
        let shutdown = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != Lifecycle::Stopped {
                return Err(WorkerError::AlreadyRunning);
            }
            state.lifecycle = Lifecycle::Running;
            state.shutdown = CancellationToken::new();
            state.shutdown.clone()
        };

        let manager = self.clone();
        let span = info_span!("task_manager");
        Ok(tokio::spawn(
            async move { manager.run_loop(shutdown).await }.instrument(span),
        ))
    }

    /// Ask the loop to exit and discard every queued invocation.
    ///
    /// The running task, if any, is cancelled cooperatively; the loop exits
    /// once it returns.
    pub fn stop(&self) {
        let discarded = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Running {
                state.lifecycle = Lifecycle::Stopping;
            }
            state.shutdown.cancel();
            let discarded = state.queue.len();
            state.queue.clear();
            discarded
        };
        info!(discarded, "Task manager stop requested");
    }

    /// Queue a run of the task registered under `slug`.
    ///
    /// Argument names and required values are checked before anything is
    /// queued. Starting a scheduled task manually restarts its timer.
    pub fn start_task(
        &self,
        slug: &str,
        progress: Progress,
        arguments: Arguments,
        cancel: Option<CancellationToken>,
    ) -> WorkerResult<()> {
        let task = self
            .inner
            .by_slug
            .get(slug)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(slug.to_string()))?;
        self.enqueue(&task, progress, arguments, cancel)
    }

    /// Queue a run of the task type `T`
    pub fn start_task_of<T: TaskDescriptor>(
        &self,
        progress: Progress,
        arguments: Arguments,
        cancel: Option<CancellationToken>,
    ) -> WorkerResult<()> {
        self.start_task(&T::metadata().slug, progress, arguments, cancel)
    }

    /// The task currently executing, if any (zero or one entry)
    pub fn running_tasks(&self) -> Vec<RunningTask> {
        self.inner.running.lock().iter().cloned().collect()
    }

    /// Metadata of every registered task, in registration order
    pub fn all_tasks(&self) -> Vec<TaskMetadata> {
        self.inner
            .tasks
            .iter()
            .map(|t| t.metadata.clone())
            .collect()
    }

    /// Number of invocations waiting to run
    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Whether the loop is alive, including while it winds down
    pub fn is_running(&self) -> bool {
        self.lifecycle() != Lifecycle::Stopped
    }

    /// Time left before `slug` is enqueued automatically, `None` if never
    pub fn next_run(&self, slug: &str) -> Option<Duration> {
        self.inner
            .by_slug
            .get(slug)?
            .scheduled_at()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn enqueue(
        &self,
        task: &Arc<ManagedTask>,
        progress: Progress,
        arguments: Arguments,
        cancel: Option<CancellationToken>,
    ) -> WorkerResult<()> {
        let parameters = (task.factory)(self).parameters();
        bind_arguments(&parameters, &arguments, &task.metadata.name)?;

        {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Stopping {
                return Err(WorkerError::ShuttingDown);
            }
            state
                .queue
                .push_back(QueuedTask::new(Arc::clone(task), progress, arguments, cancel));
        }

        self.reschedule(task);
        self.inner.wakeup.notify_one();
        debug!(task = %task.metadata.slug, "Task queued");
        Ok(())
    }

    fn reschedule(&self, task: &ManagedTask) {
        let next = self
            .inner
            .schedule
            .next_run(&task.metadata.slug, Instant::now());
        task.set_scheduled_at(next);
    }

    fn dequeue(&self) -> Option<QueuedTask> {
        self.inner.state.lock().queue.pop_front()
    }

    async fn run_loop(self, shutdown: CancellationToken) {
        info!(tasks = self.inner.tasks.len(), "Task manager started");
        self.enqueue_startup_tasks();

        while !shutdown.is_cancelled() {
            match self.dequeue() {
                Some(queued) => self.execute(queued, &shutdown).await,
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.inner.wakeup.notified() => {}
                        _ = tokio::time::sleep(self.inner.options.poll_interval) => {}
                    }
                    self.queue_scheduled_tasks();
                }
            }
        }

        let discarded = {
            let mut state = self.inner.state.lock();
            let discarded = state.queue.len();
            state.queue.clear();
            state.lifecycle = Lifecycle::Stopped;
            discarded
        };
        info!(discarded, "Task manager stopped");
    }

    fn enqueue_startup_tasks(&self) {
        let mut startup: Vec<&Arc<ManagedTask>> = self
            .inner
            .tasks
            .iter()
            .filter(|t| t.metadata.run_on_startup)
            .collect();
        startup.sort_by_key(|t| std::cmp::Reverse(t.metadata.priority));

        for task in startup {
            if let Err(e) = self.enqueue(task, Progress::noop(), Arguments::new(), None) {
                error!(task = %task.metadata.slug, error = %e, "Could not queue startup task");
            }
        }
    }

    fn queue_scheduled_tasks(&self) {
        let now = Instant::now();
        for task in self.inner.tasks.iter().filter(|t| t.is_due(now)) {
            debug!(task = %task.metadata.slug, "Queuing task scheduled for running");
            if let Err(e) = self.enqueue(task, Progress::noop(), Arguments::new(), None) {
                // Keep a misconfigured task from firing on every tick
                self.reschedule(task);
                error!(task = %task.metadata.slug, error = %e, "Could not queue scheduled task");
            }
        }
    }

    async fn execute(&self, queued: QueuedTask, shutdown: &CancellationToken) {
        let name = queued.task.metadata.name.clone();
        let span = info_span!(
            "task",
            slug = %queued.task.metadata.slug,
            invocation = %queued.id
        );

        match self.run_task(queued, shutdown).instrument(span.clone()).await {
            Ok(()) => {}
            Err(WorkerError::TaskFailed(message)) => {
                warn!(task = %name, "The task \"{}\" failed: {}", name, message);
            }
            Err(e) if e.is_caller_error() => span.in_scope(|| {
                error!(
                    task = %name,
                    error = %e,
                    "The task {} could not use its arguments",
                    name
                );
            }),
            Err(e) => span.in_scope(|| e.log()),
        }
    }

    async fn run_task(
        &self,
        queued: QueuedTask,
        shutdown: &CancellationToken,
    ) -> WorkerResult<()> {
        let QueuedTask {
            id,
            task,
            progress,
            arguments,
            cancel,
        } = queued;
        let name = task.metadata.name.as_str();

        let instance = (task.factory)(self);
        let args = bind_arguments(&instance.parameters(), &arguments, name)?;

        *self.inner.running.lock() = Some(RunningTask {
            invocation: id,
            metadata: task.metadata.clone(),
            task: Arc::clone(&instance),
            started_at: Utc::now(),
        });
        let _running = ClearOnDrop(&self.inner.running);

        let token = shutdown.child_token();
        let _release = token.clone().drop_guard();
        if let Some(caller) = cancel {
            let linked = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = caller.cancelled() => linked.cancel(),
                    _ = linked.cancelled() => {}
                }
            });
        }

        info!(task = %name, parameters = %args, "Task starting");
        let body = {
            let token = token.clone();
            tokio::spawn(
                async move { instance.run(args, progress, token).await }.in_current_span(),
            )
        };

        self.await_body(body, &token, name).await?;
        info!(task = %name, "Task finished");
        Ok(())
    }

    async fn await_body(
        &self,
        mut body: JoinHandle<WorkerResult<()>>,
        token: &CancellationToken,
        name: &str,
    ) -> WorkerResult<()> {
        if let Some(limit) = self.inner.options.soft_timeout {
            tokio::select! {
                joined = &mut body => return joined?,
                _ = tokio::time::sleep(limit) => {
                    warn!(
                        task = %name,
                        timeout = %format_duration(limit),
                        "Task exceeded its soft timeout, requesting cancellation"
                    );
                    token.cancel();
                }
            }
        }
        body.await?
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskManager")
            .field("tasks", &self.inner.tasks.len())
            .field("lifecycle", &state.lifecycle)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Clears the running snapshot however the run ends
struct ClearOnDrop<'a>(&'a Mutex<Option<RunningTask>>);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}
