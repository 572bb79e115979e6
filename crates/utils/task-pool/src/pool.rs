use crate::{
    class::PoolKey,
    error::{PoolError, PoolResult, TaskResult},
    gate::PauseGate,
    priority::Priority,
    queue::{Admission, TaskQueue},
    sizing::SizingDecision,
    task::{Task, TaskCell, TaskHandle},
};
use logger::{debug, info, warn};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

/// The task a worker is currently running, if any.
type RunningSlot = Arc<Mutex<Option<Arc<TaskCell>>>>;

/// Point-in-time view of a pool, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub key: PoolKey,
    pub decision: SizingDecision,
    pub paused: bool,
    pub shutdown: bool,
    pub queued: usize,
    pub live_workers: usize,
}

/// Fixed set of named worker threads over one priority queue and one
/// pause gate.
///
/// Running ⇄ Paused, and terminal Shutdown. Each worker dequeues, then checks
/// in at the gate, then runs the task; a task dequeued while paused is held by
/// its worker until resume.
pub struct PausablePool {
    key: PoolKey,
    decision: SizingDecision,
    queue: Arc<TaskQueue>,
    gate: Arc<PauseGate>,
    token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: Vec<RunningSlot>,
}

impl PausablePool {
    /// Build the queue and gate and spawn `decision.core_threads` workers.
    pub(crate) fn start(key: PoolKey, decision: SizingDecision) -> PoolResult<Self> {
        let pool = Self {
            queue: Arc::new(TaskQueue::new(decision.queue, decision.overflow)),
            gate: Arc::new(PauseGate::new()),
            token: CancellationToken::new(),
            workers: Mutex::new(Vec::with_capacity(decision.core_threads)),
            running: (0..decision.core_threads)
                .map(|_| RunningSlot::default())
                .collect(),
            key,
            decision,
        };

        for (n, slot) in (1..=decision.core_threads).zip(&pool.running) {
            let queue = pool.queue.clone();
            let gate = pool.gate.clone();
            let token = pool.token.clone();
            let slot = slot.clone();
            let spawned = thread::Builder::new()
                .name(pool.key.thread_name(n))
                .spawn(move || worker_loop(queue, gate, token, slot));

            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(source) => {
                    // dropping `pool` shuts down the workers spawned so far
                    return Err(PoolError::Spawn {
                        key: pool.key.clone(),
                        source,
                    });
                }
            }
        }

        Ok(pool)
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn decision(&self) -> &SizingDecision {
        &self.decision
    }

    /// Queue a prepared task. Fails with [`PoolError::InvalidState`] if the
    /// task was already executed.
    pub fn execute<T: Send + 'static>(&self, task: &Task<T>) -> PoolResult<TaskHandle<T>> {
        if self.is_shutdown() {
            return Err(PoolError::shutdown(self.key.clone()));
        }

        let (cell, job, handle) = task.prepare(&self.token)?;

        match self.queue.push(task.priority(), cell.clone(), job) {
            Admission::Queued => {}
            Admission::Evicted(oldest) => {
                warn!(
                    pool = %self.key,
                    discarded = %oldest.name(),
                    sequence = oldest.sequence(),
                    "queue full, discarding oldest task"
                );
                oldest.discard();
            }
            Admission::Rejected => {
                cell.mark_discarded();
                return Err(PoolError::rejected(
                    self.key.clone(),
                    self.queue.capacity().limit().unwrap_or_default(),
                ));
            }
            Admission::Closed => {
                cell.mark_discarded();
                return Err(PoolError::shutdown(self.key.clone()));
            }
        }

        Ok(handle)
    }

    /// Queue `work` at `priority`.
    pub fn submit<T, F>(&self, priority: impl Into<Priority>, work: F) -> PoolResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> TaskResult<T> + Send + 'static,
    {
        self.execute(&Task::new(work).with_priority(priority))
    }

    /// Stop workers from starting new tasks. Running tasks are unaffected.
    pub fn pause(&self) {
        if self.gate.pause() {
            info!(pool = %self.key, "pool paused");
        }
    }

    /// Let workers start tasks again, in queue order.
    pub fn resume(&self) {
        if self.gate.resume() {
            info!(pool = %self.key, "pool resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Forced shutdown: cancels every running task as an interrupting
    /// [`TaskHandle::cancel`] would, releases paused workers, and discards the
    /// queued tasks. Returns how many were discarded. Does not wait for
    /// workers; see [`await_termination`](Self::await_termination).
    pub fn shutdown_now(&self) -> usize {
        let first = !self.token.is_cancelled();
        self.token.cancel();
        self.gate.close();

        // a worker filling its slot after this scan sees the token and backs off
        let interrupted = self
            .running
            .iter()
            .filter_map(|slot| slot.lock().clone())
            .filter(|cell| cell.cancel(true).is_cancelled())
            .count();

        let drained = self.queue.close();
        let discarded = drained.len();
        for task in drained {
            task.discard();
        }

        if first {
            info!(pool = %self.key, discarded, interrupted, "pool shut down");
        }
        discarded
    }

    /// Wait up to `timeout` for every worker thread to exit. Joins the ones
    /// that did.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        // `None` when the timeout does not fit in an Instant: wait forever
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let mut workers = self.workers.lock();
            let (done, running): (Vec<_>, Vec<_>) =
                workers.drain(..).partition(|handle| handle.is_finished());
            *workers = running;
            let all_done = workers.is_empty();
            drop(workers);

            for handle in done {
                let _ = handle.join();
            }

            if all_done {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            key: self.key.clone(),
            decision: self.decision,
            paused: self.is_paused(),
            shutdown: self.is_shutdown(),
            queued: self.queued_len(),
            live_workers: self
                .workers
                .lock()
                .iter()
                .filter(|handle| !handle.is_finished())
                .count(),
        }
    }
}

impl Drop for PausablePool {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            self.shutdown_now();
        }
    }
}

impl fmt::Debug for PausablePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PausablePool")
            .field("key", &self.key)
            .field("decision", &self.decision)
            .field("paused", &self.is_paused())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn worker_loop(
    queue: Arc<TaskQueue>,
    gate: Arc<PauseGate>,
    shutdown: CancellationToken,
    slot: RunningSlot,
) {
    while let Some(task) = queue.pop() {
        if gate.check_in().is_err() {
            task.discard();
            break;
        }

        *slot.lock() = Some(task.cell().clone());
        if shutdown.is_cancelled() {
            slot.lock().take();
            task.discard();
            break;
        }
        task.run();
        slot.lock().take();
    }

    debug!(
        worker = thread::current().name().unwrap_or("unnamed"),
        "worker exiting"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        class::BusinessClass,
        error::TaskErrorKind,
        sizing::{OverflowPolicy, QueueCapacity},
    };
    use crossbeam_channel::bounded;

    fn decision(threads: usize, queue: QueueCapacity, overflow: OverflowPolicy) -> SizingDecision {
        SizingDecision {
            core_threads: threads,
            max_threads: threads,
            keep_alive: Duration::ZERO,
            queue,
            overflow,
        }
    }

    fn single(tag: &str) -> PausablePool {
        PausablePool::start(
            PoolKey::new(BusinessClass::HighIo, tag),
            decision(1, QueueCapacity::Unbounded, OverflowPolicy::Reject),
        )
        .unwrap()
    }

    #[test]
    fn test_workers_are_named() {
        let pool = PausablePool::start(
            PoolKey::new(BusinessClass::Cpu, "names"),
            decision(2, QueueCapacity::Unbounded, OverflowPolicy::Reject),
        )
        .unwrap();

        let handle = pool
            .submit(Priority::NORM, |_| {
                Ok(thread::current().name().map(str::to_string))
            })
            .unwrap();
        let name = handle.wait().unwrap().unwrap();

        assert!(name == "CPU#names#1" || name == "CPU#names#2", "{name}");
    }

    #[test]
    fn test_worker_survives_failing_tasks() {
        let pool = single("survive");

        let panicking = pool
            .submit(Priority::NORM, |_| -> TaskResult<()> { panic!("first") })
            .unwrap();
        let failing = pool
            .submit(Priority::NORM, |_| -> TaskResult<()> {
                Err(crate::TaskError::execution(
                    "second",
                    std::io::Error::other("disk gone"),
                ))
            })
            .unwrap();
        let healthy = pool.submit(Priority::NORM, |_| Ok(3)).unwrap();

        assert!(matches!(
            panicking.wait().unwrap_err().kind,
            TaskErrorKind::Panic { .. }
        ));
        assert!(matches!(
            failing.wait().unwrap_err().kind,
            TaskErrorKind::Execution { .. }
        ));
        assert_eq!(healthy.wait().unwrap(), 3);
    }

    #[test]
    fn test_reject_policy_surfaces_error() {
        let pool = PausablePool::start(
            PoolKey::new(BusinessClass::LowIo, "reject"),
            decision(1, QueueCapacity::Bounded(1), OverflowPolicy::Reject),
        )
        .unwrap();

        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded(1);
        let blocker = pool
            .submit(Priority::NORM, move |_| {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
                Ok(())
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued = pool.submit(Priority::NORM, |_| Ok(())).unwrap();
        let rejected = pool.submit(Priority::NORM, |_| Ok(()));
        assert!(matches!(
            rejected,
            Err(PoolError::Rejected { capacity: 1, .. })
        ));

        drop(release_tx);
        blocker.wait().unwrap();
        queued.wait().unwrap();
    }

    #[test]
    fn test_shutdown_interrupts_running_and_discards_queued() {
        let pool = single("shutdown");

        let (started_tx, started_rx) = bounded(1);
        let running = pool
            .submit(
                Priority::NORM,
                move |token: &CancellationToken| -> TaskResult<()> {
                    started_tx.send(()).unwrap();
                    while !token.is_cancelled() {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Err(crate::TaskError::interrupted("spinner"))
                },
            )
            .unwrap();
        started_rx.recv().unwrap();

        let queued = pool.submit(Priority::NORM, |_| Ok(())).unwrap();

        assert_eq!(pool.shutdown_now(), 1);
        assert_eq!(pool.shutdown_now(), 0);
        assert!(pool.is_shutdown());

        assert!(running.wait().unwrap_err().is_cancelled());
        assert!(matches!(
            queued.wait().unwrap_err().kind,
            TaskErrorKind::Discarded
        ));
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(matches!(
            pool.submit(Priority::NORM, |_| Ok(())),
            Err(PoolError::Shutdown { .. })
        ));
    }

    #[test]
    fn test_shutdown_cancels_work_that_ignores_its_token() {
        let pool = single("stubborn");

        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(0);
        let running = pool
            .submit(Priority::NORM, move |_| {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
                Ok("completed")
            })
            .unwrap();
        started_rx.recv().unwrap();
        assert_eq!(running.status(), crate::TaskStatus::Running);

        pool.shutdown_now();

        assert_eq!(running.status(), crate::TaskStatus::Cancelled);
        let err = running.wait_timeout(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err.kind, TaskErrorKind::Cancelled));

        drop(release_tx);
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_await_termination_accepts_unbounded_timeout() {
        let pool = single("forever");
        pool.shutdown_now();
        assert!(pool.await_termination(Duration::MAX));
    }

    #[test]
    fn test_shutdown_releases_paused_workers() {
        let pool = single("paused-shutdown");
        pool.pause();

        let held = pool.submit(Priority::NORM, |_| Ok(())).unwrap();
        // give the worker time to dequeue and block at the gate
        thread::sleep(Duration::from_millis(50));

        pool.shutdown_now();

        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(matches!(
            held.wait().unwrap_err().kind,
            TaskErrorKind::Discarded
        ));
    }

    #[test]
    fn test_status_snapshot() {
        let pool = single("status");
        pool.pause();
        let status = pool.status();

        assert_eq!(status.key, PoolKey::new(BusinessClass::HighIo, "status"));
        assert!(status.paused);
        assert!(!status.shutdown);
        assert_eq!(status.live_workers, 1);
    }
}
