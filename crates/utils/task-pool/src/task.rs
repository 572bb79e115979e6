//! Execute-once tasks and the caller-side handle to their result.

use crate::{
    error::{PoolError, PoolResult, TaskError, TaskErrorKind, TaskResult},
    priority::{Job, Priority},
};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use logger::{debug, error};
use parking_lot::Mutex;
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// The unit of work. The token fires on interrupting cancel or pool shutdown.
pub type Work<T> = Box<dyn FnOnce(&CancellationToken) -> TaskResult<T> + Send + 'static>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;
const DISCARDED: u8 = 4;

/// Lifecycle of a submitted task. Each transition happens at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
    Cancelled,
    Discarded,
}

impl TaskStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            PENDING => Self::Pending,
            RUNNING => Self::Running,
            FINISHED => Self::Finished,
            CANCELLED => Self::Cancelled,
            _ => Self::Discarded,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Result of [`TaskHandle::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStatus {
    /// Cancelled before it started; it will never run.
    Cancelled,
    /// Was running; its token has fired.
    Interrupted,
    /// Running and `interrupt_if_running` was false.
    StillRunning,
    AlreadyFinished,
    AlreadyCancelled,
    /// Dropped from the queue before it could run.
    Discarded,
}

impl CancelStatus {
    /// Whether this call is what cancelled the task.
    pub fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled | Self::Interrupted)
    }
}

/// Notified once when a task reaches a terminal status.
///
/// Called on whichever thread caused the transition: a worker for
/// `Finished`, the cancelling thread for `Cancelled`, the submitting or
/// shutting-down thread for `Discarded`. Implementations that need a specific
/// thread must forward the notification themselves.
pub trait CompletionSink: Send + Sync + 'static {
    fn on_terminal(&self, task_name: &str, status: TaskStatus);
}

impl<F> CompletionSink for F
where
    F: Fn(&str, TaskStatus) + Send + Sync + 'static,
{
    fn on_terminal(&self, task_name: &str, status: TaskStatus) {
        self(task_name, status)
    }
}

/// Shared, type-erased state of one submitted task.
pub(crate) struct TaskCell {
    name: String,
    state: AtomicU8,
    token: CancellationToken,
    sink: Option<Arc<dyn CompletionSink>>,
    // dropped on cancel or discard so waiters stop blocking
    abort: Mutex<Option<Sender<()>>>,
    aborted: Receiver<()>,
}

impl TaskCell {
    #[cfg(test)]
    pub(crate) fn new(name: impl Into<String>, sink: Option<Arc<dyn CompletionSink>>) -> Self {
        Self::with_token(name, sink, CancellationToken::new())
    }

    /// Cell whose token is cancelled along with `parent`.
    pub(crate) fn child_of(
        name: impl Into<String>,
        sink: Option<Arc<dyn CompletionSink>>,
        parent: &CancellationToken,
    ) -> Self {
        Self::with_token(name, sink, parent.child_token())
    }

    fn with_token(
        name: impl Into<String>,
        sink: Option<Arc<dyn CompletionSink>>,
        token: CancellationToken,
    ) -> Self {
        let (abort, aborted) = bounded(0);
        Self {
            name: name.into(),
            state: AtomicU8::new(PENDING),
            token,
            sink,
            abort: Mutex::new(Some(abort)),
            aborted,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the task for execution. `false` if it was cancelled meanwhile.
    pub(crate) fn begin(&self) -> bool {
        self.transition(PENDING, RUNNING)
    }

    /// `false` if an interrupting cancel won the race with completion.
    pub(crate) fn finish(&self) -> bool {
        let finished = self.transition(RUNNING, FINISHED);
        if finished {
            self.notify(TaskStatus::Finished);
        }
        finished
    }

    pub(crate) fn mark_discarded(&self) {
        if self.transition(PENDING, DISCARDED) {
            self.release_waiters();
            self.notify(TaskStatus::Discarded);
        }
    }

    pub(crate) fn cancel(&self, interrupt_if_running: bool) -> CancelStatus {
        loop {
            match self.state.load(Ordering::Acquire) {
                PENDING => {
                    if self.transition(PENDING, CANCELLED) {
                        self.token.cancel();
                        self.release_waiters();
                        self.notify(TaskStatus::Cancelled);
                        return CancelStatus::Cancelled;
                    }
                }
                RUNNING => {
                    if !interrupt_if_running {
                        return CancelStatus::StillRunning;
                    }
                    if self.transition(RUNNING, CANCELLED) {
                        self.token.cancel();
                        self.release_waiters();
                        self.notify(TaskStatus::Cancelled);
                        return CancelStatus::Interrupted;
                    }
                }
                FINISHED => return CancelStatus::AlreadyFinished,
                CANCELLED => return CancelStatus::AlreadyCancelled,
                _ => return CancelStatus::Discarded,
            }
        }
    }

    fn release_waiters(&self) {
        self.abort.lock().take();
    }

    fn notify(&self, status: TaskStatus) {
        if let Some(sink) = &self.sink {
            sink.on_terminal(&self.name, status);
        }
    }
}

impl fmt::Debug for TaskCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCell")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

/// A unit of work prepared for submission. It can be executed once.
pub struct Task<T> {
    name: String,
    priority: Priority,
    work: Mutex<Option<Work<T>>>,
    sink: Option<Arc<dyn CompletionSink>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> TaskResult<T> + Send + 'static,
    {
        let work: Work<T> = Box::new(work);
        Self {
            name: String::from("task"),
            priority: Priority::default(),
            work: Mutex::new(Some(work)),
            sink: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_sink(mut self, sink: impl CompletionSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the task has already been handed to a pool.
    pub fn is_consumed(&self) -> bool {
        self.work.lock().is_none()
    }

    /// Turn this task into a queued job bound to `parent`'s cancellation.
    ///
    /// Fails with [`PoolError::InvalidState`] on the second call.
    pub(crate) fn prepare(
        &self,
        parent: &CancellationToken,
    ) -> PoolResult<(Arc<TaskCell>, Job, TaskHandle<T>)> {
        let work = self
            .work
            .lock()
            .take()
            .ok_or_else(|| PoolError::invalid_state(self.name.clone()))?;

        let cell = Arc::new(TaskCell::child_of(
            self.name.clone(),
            self.sink.clone(),
            parent,
        ));
        let (tx, rx) = bounded(1);
        let job = into_job(cell.clone(), work, tx);
        let handle = TaskHandle {
            cell: cell.clone(),
            rx,
        };

        Ok((cell, job, handle))
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("consumed", &self.work.lock().is_none())
            .finish()
    }
}

fn into_job<T: Send + 'static>(
    cell: Arc<TaskCell>,
    work: Work<T>,
    tx: Sender<TaskResult<T>>,
) -> Job {
    Box::new(move || {
        if !cell.begin() {
            debug!(task = %cell.name(), "skipping cancelled task");
            return;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&cell.token)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(task = %cell.name(), %message, "task panicked");
                Err(TaskError::panic(cell.name(), message))
            });

        if let Err(e) = &outcome {
            debug!(task = %cell.name(), error = %e, "task returned an error");
        }

        if cell.finish() {
            // the handle may have been dropped; nobody is waiting then
            let _ = tx.send(outcome);
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

/// Caller-side view of a submitted task.
pub struct TaskHandle<T> {
    cell: Arc<TaskCell>,
    rx: Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    pub fn status(&self) -> TaskStatus {
        self.cell.status()
    }

    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// Cancel the task. A pending task never runs afterwards; a running one
    /// only has its token fired, and only when `interrupt_if_running` is set.
    pub fn cancel(&self, interrupt_if_running: bool) -> CancelStatus {
        self.cell.cancel(interrupt_if_running)
    }

    /// Block until the task produces a result or is cancelled or discarded.
    pub fn wait(self) -> TaskResult<T> {
        select! {
            recv(self.rx) -> msg => msg.unwrap_or_else(|_| Err(self.closed_error())),
            recv(self.cell.aborted) -> _ => self.after_abort(),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout` with
    /// [`TaskErrorKind::Timeout`], leaving the task untouched.
    ///
    /// A result can be taken once; later calls report an invalid state.
    pub fn wait_timeout(&self, timeout: Duration) -> TaskResult<T> {
        select! {
            recv(self.rx) -> msg => msg.unwrap_or_else(|_| Err(self.closed_error())),
            recv(self.cell.aborted) -> _ => self.after_abort(),
            default(timeout) => Err(TaskError::new(
                self.name(),
                TaskErrorKind::Timeout { timeout },
            )),
        }
    }

    fn after_abort(&self) -> TaskResult<T> {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(_) => Err(self.closed_error()),
        }
    }

    fn closed_error(&self) -> TaskError {
        let kind = match self.status() {
            TaskStatus::Cancelled => TaskErrorKind::Cancelled,
            TaskStatus::Discarded => TaskErrorKind::Discarded,
            TaskStatus::Finished => TaskErrorKind::InvalidState {
                message: "result already taken".into(),
            },
            TaskStatus::Pending | TaskStatus::Running => TaskErrorKind::Interrupted,
        };
        TaskError::new(self.name(), kind)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}
